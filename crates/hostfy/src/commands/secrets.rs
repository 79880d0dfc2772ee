use colored::Colorize;
use hostfy_core::StateStore;
use hostfy_engine::status::secrets_view;
use std::path::Path;

pub async fn handle(state_dir: &Path, name: String) -> anyhow::Result<()> {
    let view = secrets_view(&StateStore::new(state_dir), &name)?;

    println!();
    println!("{}", format!("'{}' の環境変数:", view.app).bold().cyan());
    for (key, value) in &view.env {
        println!("  {} = {}", key, value.yellow());
    }

    println!();
    println!("{}", "システムシークレット:".bold().cyan());
    println!("  postgres_password = {}", view.system.postgres_password.yellow());
    if let Some(redis) = &view.system.redis_password {
        println!("  redis_password = {}", redis.yellow());
    }
    println!("  system_key = {}", view.system.system_key.yellow());

    println!();
    println!(
        "{}",
        "⚠ この出力には機密情報が含まれます。共有しないでください".red()
    );

    Ok(())
}
