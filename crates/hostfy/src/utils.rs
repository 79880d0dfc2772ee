use crate::docker;
use colored::Colorize;
use hostfy_core::StateStore;
use hostfy_engine::{EngineContext, EngineSettings, HttpCatalogSource};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// 状態ディレクトリ・カタログ取得元・Docker接続から実行コンテキストを作る
pub async fn build_context(state_dir: &Path) -> anyhow::Result<EngineContext> {
    let store = StateStore::new(state_dir);
    let config = store.load_config()?;
    debug!(state_dir = %state_dir.display(), network = %config.network, "Building engine context");
    let source = Arc::new(HttpCatalogSource::new()?);
    let runtime = docker::connect_with_error_handling().await?;
    Ok(EngineContext::new(
        store,
        source,
        runtime,
        EngineSettings::from_config(&config),
    ))
}

/// `--env KEY=VALUE` をパースする（clap の value_parser）
pub fn parse_env_pair(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.to_string()))
        }
        _ => Err(format!(
            "KEY=VALUE 形式で指定してください: '{}'",
            value
        )),
    }
}

/// 同じキーは後に指定した値が勝つ
pub fn collect_env(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().collect()
}

/// y/N の確認プロンプト
pub fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// 処理は成功したが注意が必要な項目
pub fn print_advisories(advisories: &[String]) {
    if advisories.is_empty() {
        return;
    }
    println!();
    println!("{}", "⚠ 注意:".yellow().bold());
    for advisory in advisories {
        println!("  • {}", advisory.yellow());
    }
}

/// ドメインごとに必要なDNS設定を案内する
pub fn print_dns_hint(domains: &[String]) {
    if domains.is_empty() {
        return;
    }
    println!();
    println!("{}", "DNS設定:".bold());
    for domain in domains {
        println!("  • {} をこのサーバーのIPアドレスに向けてください", domain.cyan());
    }
}
