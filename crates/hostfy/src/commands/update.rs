use crate::utils;
use colored::Colorize;
use hostfy_engine::{UpdateRequest, update};
use std::path::Path;

pub async fn handle(
    state_dir: &Path,
    name: String,
    domain: Option<String>,
    env: Vec<(String, String)>,
) -> anyhow::Result<()> {
    if domain.is_none() && env.is_empty() {
        anyhow::bail!(
            "変更内容を指定してください\n\nヒント:\n  • hostfy update {} --domain <new.domain.com>\n  • hostfy update {} --env KEY=VALUE",
            name,
            name
        );
    }

    println!("{}", format!("'{}' の設定を更新中...", name).blue());
    let ctx = utils::build_context(state_dir).await?;

    let report = update(
        &ctx,
        UpdateRequest {
            name,
            domain,
            env_overrides: utils::collect_env(env),
        },
    )
    .await?;

    if report.is_noop() {
        println!("{}", "ℹ 変更はありません".dimmed());
        return Ok(());
    }

    for change in &report.changes {
        println!("  • {}", change);
    }
    for container in &report.recreated {
        println!("  ✓ 再作成: {}", container.cyan());
    }

    println!();
    println!(
        "{}",
        format!("✓ '{}' を更新しました", report.name).green().bold()
    );
    if let Some(domain) = &report.new_domain {
        utils::print_dns_hint(std::slice::from_ref(domain));
    }

    Ok(())
}
