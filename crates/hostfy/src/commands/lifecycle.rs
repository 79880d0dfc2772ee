use crate::utils;
use colored::Colorize;
use hostfy_engine::lifecycle::run;
use hostfy_engine::{LifecycleAction, Target};
use std::path::Path;

/// start / stop / restart の共通処理
pub async fn handle(state_dir: &Path, action: LifecycleAction, target: &str) -> anyhow::Result<()> {
    let verb = match action {
        LifecycleAction::Start => "起動",
        LifecycleAction::Stop => "停止",
        LifecycleAction::Restart => "再起動",
    };
    let target = Target::parse(target);
    let label = match &target {
        Target::All => "すべてのアプリ".to_string(),
        Target::App(name) => format!("'{}'", name),
    };
    println!("{}", format!("{} を{}中...", label, verb).yellow());

    let ctx = utils::build_context(state_dir).await?;
    let report = run(&ctx, action, target).await?;

    for container in &report.containers {
        println!("  ✓ {}", container.cyan());
    }

    println!();
    if report.containers.is_empty() && report.advisories.is_empty() {
        println!("{}", "ℹ 対象のコンテナはありません".dimmed());
    } else {
        println!("{}", format!("✓ {} を{}しました", label, verb).green().bold());
    }
    utils::print_advisories(&report.advisories);

    Ok(())
}
