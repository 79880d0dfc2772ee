use crate::utils;
use hostfy_engine::status::system_status;
use std::path::Path;

/// 機械可読なJSONをstdoutに出す
pub async fn handle(state_dir: &Path) -> anyhow::Result<()> {
    let ctx = utils::build_context(state_dir).await?;
    let status = system_status(&ctx).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
