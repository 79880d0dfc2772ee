use crate::utils;
use colored::Colorize;
use hostfy_engine::{cleanup, find_orphans};
use std::path::Path;

pub async fn handle(state_dir: &Path, yes: bool) -> anyhow::Result<()> {
    println!("{}", "孤立したリソースを検索中...".blue());
    let ctx = utils::build_context(state_dir).await?;

    let orphans = find_orphans(&ctx).await?;
    if orphans.is_empty() {
        println!("{}", "✓ 孤立したリソースはありません".green());
        return Ok(());
    }

    println!();
    if !orphans.containers.is_empty() {
        println!("{}", "コンテナ:".bold());
        for name in &orphans.containers {
            println!("  • {}", name.yellow());
        }
    }
    if !orphans.databases.is_empty() {
        println!("{}", "データベース:".bold());
        for name in &orphans.databases {
            println!("  • {}", name.yellow());
        }
    }

    if !yes {
        println!();
        println!(
            "{}",
            "削除するには: hostfy cleanup --yes".dimmed()
        );
        return Ok(());
    }

    let report = cleanup(&ctx, &orphans, true).await?;
    println!();
    for step in &report.completed {
        println!("  ✓ {}", step.describe());
    }
    if report.is_clean() {
        println!("{}", "✓ クリーンアップが完了しました".green().bold());
    }
    utils::print_advisories(&report.advisories);

    Ok(())
}
