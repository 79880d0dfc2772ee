use colored::Colorize;
use hostfy_core::StateStore;
use hostfy_engine::context::CATALOG_TTL;
use hostfy_engine::{CatalogRepository, HttpCatalogSource};
use std::path::Path;
use std::sync::Arc;

/// カタログの一覧（Docker接続は不要）
pub async fn handle(state_dir: &Path, refresh: bool) -> anyhow::Result<()> {
    if refresh {
        println!("{}", "カタログを更新中...".blue());
    }

    let store = StateStore::new(state_dir);
    let repository = CatalogRepository::new(store, Arc::new(HttpCatalogSource::new()?), CATALOG_TTL);
    let catalog = repository.fetch_allow_stale(refresh).await?;

    if catalog.apps.is_empty() {
        println!("{}", "カタログにアプリがありません".yellow());
        return Ok(());
    }

    println!();
    println!("{}", "利用可能なアプリ:".bold().cyan());
    println!();

    for (id, app) in &catalog.apps {
        let deps = if app.dependencies.is_empty() {
            String::new()
        } else {
            format!(" [依存: {}]", app.dependencies.join(", "))
        };
        println!("  {} {}{}", "•".green(), id.bold(), deps.dimmed());
        if !app.description.is_empty() {
            println!("    {}", app.description);
        }
        if app.is_stack() {
            let members: Vec<String> = app
                .containers
                .iter()
                .map(|c| {
                    if c.is_main {
                        format!("{}*", c.name)
                    } else {
                        c.name.clone()
                    }
                })
                .collect();
            println!("    {} {}", "スタック:".dimmed(), members.join(", ").dimmed());
        }
        println!();
    }

    println!(
        "インストール: {}",
        "hostfy install <app> --domain <your.domain.com>".cyan()
    );

    Ok(())
}
