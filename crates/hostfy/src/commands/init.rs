use crate::docker;
use crate::progress::Spinner;
use colored::Colorize;
use hostfy_core::StateStore;
use hostfy_core::naming::PROXY_SERVICE;
use hostfy_engine::services::ensure_service;
use hostfy_engine::{EngineContext, EngineSettings, EnsureOutcome, HttpCatalogSource};
use std::path::Path;
use std::sync::Arc;

pub async fn handle(state_dir: &Path, catalog_url: Option<String>) -> anyhow::Result<()> {
    println!("{}", "hostfy を初期化中...".blue());

    // 1. ディレクトリと設定
    let store = StateStore::new(state_dir);
    store.ensure_directories()?;
    let mut config = store.load_config()?;
    if let Some(url) = catalog_url {
        config.catalog_url = url;
    }
    store.save_config(&config)?;
    println!("  ✓ 状態ディレクトリ: {}", state_dir.display().to_string().cyan());
    println!("  ✓ カタログ: {}", config.catalog_url.cyan());

    // 2. システムシークレット（既存の値は変えない）
    let secrets = store.ensure_secrets()?;
    println!("  ✓ システムシークレット");

    // 3. ネットワーク
    let runtime = docker::connect_with_error_handling().await?;
    let ctx = EngineContext::new(
        store,
        Arc::new(HttpCatalogSource::new()?),
        runtime,
        EngineSettings::from_config(&config),
    );
    ctx.runtime.ensure_network(&ctx.settings.network).await?;
    println!("  ✓ ネットワーク: {}", ctx.settings.network.cyan());

    // 4. プロキシ
    let spinner = Spinner::new("Traefik を起動中...");
    let outcome = ensure_service(&ctx, ctx.catalog.cached().as_ref(), PROXY_SERVICE, &secrets).await;
    spinner.finish();
    match outcome? {
        EnsureOutcome::AlreadyRunning => println!("  ℹ Traefik は既に起動しています"),
        EnsureOutcome::Started => println!("  ✓ Traefik を起動しました"),
        EnsureOutcome::Created => println!("  ✓ Traefik を作成しました"),
    }

    println!();
    println!("{}", "✓ hostfy を初期化しました！".green().bold());
    println!();
    println!("{}", "次のステップ:".bold());
    println!("  1. 利用可能なアプリを確認:");
    println!("     {}", "hostfy catalog".cyan());
    println!("  2. 最初のアプリをインストール:");
    println!("     {}", "hostfy install n8n --domain n8n.example.com".cyan());
    println!("  3. ドメインのDNSをこのサーバーに向ける");

    Ok(())
}
