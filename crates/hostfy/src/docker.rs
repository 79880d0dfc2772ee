use colored::Colorize;
use hostfy_container::{ContainerRuntime, DockerRuntime};
use std::sync::Arc;

/// Docker接続を初期化（エラーハンドリング付き）
pub async fn connect_with_error_handling() -> anyhow::Result<Arc<dyn ContainerRuntime>> {
    match DockerRuntime::connect().await {
        Ok(runtime) => Ok(Arc::new(runtime)),
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Docker接続エラー".red().bold());
            eprintln!();
            eprintln!("{}", "原因:".yellow());
            eprintln!("  {}", e);
            eprintln!();
            eprintln!("{}", "解決方法:".yellow());
            eprintln!("  • Dockerが起動しているか確認してください");
            eprintln!("  • hostfy を実行するユーザーが docker グループに所属しているか確認してください");
            eprintln!("  • docker ps コマンドが正常に動作するか確認してください");
            Err(anyhow::anyhow!("Docker接続に失敗しました"))
        }
    }
}
