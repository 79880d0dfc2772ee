use crate::utils;
use colored::Colorize;
use futures_util::stream::StreamExt;
use hostfy_engine::lifecycle;
use std::path::Path;

pub async fn handle(
    state_dir: &Path,
    name: String,
    container: Option<String>,
    tail: usize,
    follow: bool,
) -> anyhow::Result<()> {
    let ctx = utils::build_context(state_dir).await?;
    let mut log_stream = lifecycle::logs(&ctx, &name, container.as_deref(), tail, follow).await?;

    while let Some(line) = log_stream.next().await {
        match line {
            Ok(line) => {
                if !line.is_empty() {
                    println!("{}", line);
                }
            }
            Err(e) => {
                eprintln!("  ⚠ ログ取得エラー ({}): {}", name, e);
                break;
            }
        }
    }

    if follow {
        println!();
        println!("{}", "Ctrl+C でログ追跡を終了".dimmed());
    }

    Ok(())
}
