use crate::utils;
use colored::Colorize;
use hostfy_engine::status::{list_databases, remove_database};
use std::path::Path;

pub async fn handle_list(state_dir: &Path) -> anyhow::Result<()> {
    let ctx = utils::build_context(state_dir).await?;
    let entries = list_databases(&ctx).await?;

    if entries.is_empty() {
        println!("{}", "データベースはありません".dimmed());
        return Ok(());
    }

    println!();
    println!("{}", format!("{:<30} {:<20}", "DATABASE", "APP").bold());
    println!("{}", "─".repeat(50).dimmed());
    for entry in &entries {
        let owner = match &entry.app {
            Some(app) => app.green(),
            None => "orphan".yellow(),
        };
        println!("{:<30} {}", entry.name.cyan(), owner);
    }

    let orphans = entries.iter().filter(|e| e.app.is_none()).count();
    if orphans > 0 {
        println!();
        println!(
            "{}",
            format!(
                "{} 個の孤立したデータベースがあります（hostfy db remove <db> で削除）",
                orphans
            )
            .dimmed()
        );
    }

    Ok(())
}

pub async fn handle_remove(state_dir: &Path, database: String, force: bool) -> anyhow::Result<()> {
    if !force {
        println!(
            "{}",
            format!("データベース '{}' を削除します", database).yellow().bold()
        );
        println!("  {}", "⚠ データは復元できません".red().bold());
        if !utils::confirm("続行しますか？")? {
            println!("{}", "キャンセルしました".yellow());
            return Ok(());
        }
    }

    let ctx = utils::build_context(state_dir).await?;
    remove_database(&ctx, &database).await?;

    println!(
        "{}",
        format!("✓ データベース '{}' を削除しました", database)
            .green()
            .bold()
    );
    Ok(())
}
