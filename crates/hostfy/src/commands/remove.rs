use crate::utils;
use colored::Colorize;
use hostfy_core::StateStore;
use hostfy_engine::{EngineError, RemoveRequest, remove};
use std::path::Path;

pub async fn handle(state_dir: &Path, name: String, purge: bool, yes: bool) -> anyhow::Result<()> {
    let store = StateStore::new(state_dir);
    if !store.app_exists(&name) {
        return Err(EngineError::StateRecordNotFound(name).into());
    }
    let record = store.load_app(&name)?;

    println!("{}", format!("'{}' を削除します", name).yellow().bold());
    for container in record.runtime_names() {
        println!("  • コンテナ: {}", container.cyan());
    }
    if purge {
        if !record.database.is_empty() {
            println!("  • データベース: {}", record.database.red());
        }
        println!("  • ボリューム: {}", format!("{}_*", record.name).red());
        println!("  {}", "⚠ データは復元できません".red().bold());
    } else {
        println!(
            "  {}",
            "ℹ データベース・ボリュームは残し、シークレットはバックアップします".dimmed()
        );
    }
    println!();

    if !yes && !utils::confirm("続行しますか？")? {
        println!("{}", "キャンセルしました".yellow());
        return Ok(());
    }

    let ctx = utils::build_context(state_dir).await?;
    let report = remove(&ctx, RemoveRequest { name, purge }).await?;

    for container in &report.removed_containers {
        println!("  ✓ コンテナを削除: {}", container);
    }
    if let Some(database) = &report.dropped_database {
        println!("  ✓ データベースを削除: {}", database);
    }
    for volume in &report.removed_volumes {
        println!("  ✓ ボリュームを削除: {}", volume);
    }
    if report.secrets_backed_up {
        println!("  ✓ シークレットをバックアップしました（再インストール時に再利用）");
    }

    println!();
    println!(
        "{}",
        format!("✓ '{}' を削除しました", report.name).green().bold()
    );
    utils::print_advisories(&report.advisories);

    Ok(())
}
