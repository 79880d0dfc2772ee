use crate::utils;
use colored::Colorize;
use hostfy_core::StateStore;
use hostfy_engine::status::{RunState, app_status};
use std::path::Path;

pub async fn handle(state_dir: &Path) -> anyhow::Result<()> {
    let store = StateStore::new(state_dir);
    let apps = store.list_apps()?;

    // 記録がなければDockerに接続しない
    if apps.is_empty() {
        println!("{}", "インストール済みのアプリはありません".dimmed());
        println!();
        println!(
            "最初のアプリをインストール: {}",
            "hostfy install <app> --domain <your.domain.com>".cyan()
        );
        return Ok(());
    }

    let ctx = utils::build_context(state_dir).await?;

    println!();
    println!("{}", "インストール済みのアプリ:".bold().cyan());
    println!();

    for record in &apps {
        let status = app_status(&ctx, record).await?;
        let (icon, label) = match status.status {
            RunState::Running => ("●".green(), "起動中".green()),
            RunState::Stopped => ("○".red(), "停止中".red()),
            RunState::Missing => ("○".red(), "コンテナなし".red()),
        };

        println!("  {} {}  {}", icon, record.name.bold(), label);
        if record.catalog_app != record.name {
            println!("    アプリ: {}", record.catalog_app);
        }
        if !record.domain.is_empty() {
            println!("    URL:    https://{}", record.domain);
        }
        if record.is_stack {
            for container in &status.containers {
                println!(
                    "    - {} ({}) {}",
                    container.name,
                    container.image.dimmed(),
                    container.status.as_str()
                );
            }
        } else {
            println!("    イメージ: {}", record.image);
        }
        println!();
    }

    Ok(())
}
