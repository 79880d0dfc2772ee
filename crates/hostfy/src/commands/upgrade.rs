use crate::progress::Spinner;
use crate::utils;
use colored::Colorize;
use hostfy_engine::{UpgradeRequest, upgrade};
use std::path::Path;

pub async fn handle(state_dir: &Path, name: String, force: bool) -> anyhow::Result<()> {
    println!("{}", format!("'{}' の更新を確認中...", name).blue());
    let ctx = utils::build_context(state_dir).await?;

    let spinner = Spinner::new("カタログと比較中...");
    let result = upgrade(&ctx, UpgradeRequest { name, force }).await;
    spinner.finish();
    let report = result?;

    for key in &report.added_env {
        println!("  + 環境変数: {}", key.green());
    }

    if report.up_to_date {
        println!();
        println!(
            "{}",
            format!("✓ '{}' は最新です", report.name).green().bold()
        );
        utils::print_advisories(&report.advisories);
        return Ok(());
    }

    for change in &report.image_changes {
        println!(
            "  {} {} → {}",
            change.container.cyan(),
            change.from.dimmed(),
            change.to.green()
        );
    }
    for container in &report.recreated {
        println!("  ✓ 再作成: {}", container.cyan());
    }

    println!();
    println!(
        "{}",
        format!("✓ '{}' を更新しました", report.name).green().bold()
    );
    utils::print_advisories(&report.advisories);

    Ok(())
}
