use crate::progress::Spinner;
use crate::utils;
use colored::Colorize;
use hostfy_engine::{InstallRequest, install};
use std::path::Path;

pub async fn handle(
    state_dir: &Path,
    app: String,
    domain: String,
    name: Option<String>,
    env: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let request = InstallRequest {
        app_id: app,
        name,
        domain,
        env_overrides: utils::collect_env(env),
    };
    println!(
        "{}",
        format!("'{}' をインストール中...", request.stack_name()).blue()
    );

    let ctx = utils::build_context(state_dir).await?;

    let spinner = Spinner::new("依存サービスとコンテナを準備中...");
    let result = install(&ctx, request).await;
    spinner.finish();
    let report = result?;

    if report.reused_secrets {
        println!("  ℹ 以前のインストールのシークレットを再利用しました");
    }
    if let Some(database) = &report.database {
        println!("  ✓ データベース: {}", database.cyan());
    }
    for container in &report.containers {
        println!("  ✓ コンテナ: {}", container.cyan());
    }

    println!();
    println!(
        "{}",
        format!("✓ '{}' をインストールしました！", report.name)
            .green()
            .bold()
    );
    if let Some(main) = report.domains.first() {
        println!("  URL: {}", format!("https://{}", main).cyan());
    }

    if !report.credentials.is_empty() {
        println!();
        println!("{}", "初期設定値（安全な場所に保管してください）:".bold());
        for (key, value) in &report.credentials {
            println!("  {} = {}", key, value.yellow());
        }
    }

    utils::print_dns_hint(&report.domains);
    utils::print_advisories(&report.advisories);

    Ok(())
}
