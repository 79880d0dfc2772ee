mod commands;
mod docker;
mod progress;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hostfy", version)]
#[command(about = "カタログからセルフホストアプリを1コマンドで。", long_about = None)]
struct Cli {
    /// 状態ディレクトリ（デフォルト: /etc/hostfy）
    #[arg(long, global = true, env = "HOSTFY_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 状態ディレクトリとシークレットを作成し、プロキシを起動
    Init {
        /// カタログの取得元URL
        #[arg(long, env = "HOSTFY_CATALOG_URL")]
        catalog_url: Option<String>,
    },
    /// カタログのアプリ一覧を表示
    Catalog {
        /// キャッシュを使わずに再取得
        #[arg(short, long)]
        refresh: bool,
    },
    /// アプリをインストール
    Install {
        /// カタログ上のアプリID
        app: String,
        /// 公開ドメイン
        #[arg(short, long)]
        domain: String,
        /// インストール名（省略時はアプリID。同じアプリを複数入れる場合に指定）
        #[arg(short, long)]
        name: Option<String>,
        /// 環境変数の上書き（KEY=VALUE、複数指定可）
        #[arg(short, long = "env", value_parser = utils::parse_env_pair)]
        env: Vec<(String, String)>,
    },
    /// ドメイン・環境変数を変更してコンテナを作り直す
    #[command(alias = "config")]
    Update {
        /// インストール名
        name: String,
        /// 新しいドメイン
        #[arg(short, long)]
        domain: Option<String>,
        /// 環境変数の上書き（KEY=VALUE、複数指定可）
        #[arg(short, long = "env", value_parser = utils::parse_env_pair)]
        env: Vec<(String, String)>,
    },
    /// カタログの最新イメージに更新
    #[command(alias = "pull")]
    Upgrade {
        /// インストール名
        name: String,
        /// イメージに差分がなくても作り直す
        #[arg(short, long)]
        force: bool,
    },
    /// アプリを削除（デフォルトではデータベースとボリュームを残す）
    #[command(alias = "uninstall")]
    Remove {
        /// インストール名
        name: String,
        /// データベース・ボリューム・シークレットのバックアップも削除
        #[arg(long)]
        purge: bool,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 記録にない管理対象コンテナとデータベースを検出して削除
    Cleanup {
        /// 確認なしで削除（指定しなければ一覧の表示のみ）
        #[arg(short, long)]
        yes: bool,
    },
    /// インストール済みアプリの一覧を表示
    List,
    /// 共有サービスとアプリの状態をJSONで表示
    Status,
    /// アプリを起動（"all" で共有サービスとすべてのアプリ）
    Start {
        /// インストール名または all
        target: String,
    },
    /// アプリを停止（"all" ですべてのアプリ）
    Stop {
        /// インストール名または all
        target: String,
    },
    /// アプリを再起動（"all" で共有サービスとすべてのアプリ）
    Restart {
        /// インストール名または all
        target: String,
    },
    /// コンテナのログを表示
    Logs {
        /// インストール名
        name: String,
        /// スタック内のコンテナ名（省略時はメインコンテナ）
        #[arg(short, long)]
        container: Option<String>,
        /// ログの行数
        #[arg(short = 'n', long, default_value = "100")]
        tail: usize,
        /// ログをリアルタイムで追跡
        #[arg(short, long)]
        follow: bool,
    },
    /// アプリの環境変数とシステムシークレットを表示
    Secrets {
        /// インストール名
        name: String,
    },
    /// 共有PostgreSQLのデータベースを管理
    #[command(subcommand)]
    Db(DbCommands),
}

/// データベース管理のサブコマンド
#[derive(Subcommand)]
enum DbCommands {
    /// データベースと使用中のアプリを表示
    List,
    /// データベースを削除（アプリが使用中なら拒否）
    Remove {
        /// データベース名
        database: String,
        /// 確認なしで実行
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderr（stdoutは表示とJSON出力に使う）
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let state_dir = cli.state_dir.unwrap_or_else(hostfy_config::state_dir);

    match cli.command {
        Commands::Init { catalog_url } => {
            commands::init::handle(&state_dir, catalog_url).await?;
        }
        Commands::Catalog { refresh } => {
            commands::catalog::handle(&state_dir, refresh).await?;
        }
        Commands::Install {
            app,
            domain,
            name,
            env,
        } => {
            commands::install::handle(&state_dir, app, domain, name, env).await?;
        }
        Commands::Update { name, domain, env } => {
            commands::update::handle(&state_dir, name, domain, env).await?;
        }
        Commands::Upgrade { name, force } => {
            commands::upgrade::handle(&state_dir, name, force).await?;
        }
        Commands::Remove { name, purge, yes } => {
            commands::remove::handle(&state_dir, name, purge, yes).await?;
        }
        Commands::Cleanup { yes } => {
            commands::cleanup::handle(&state_dir, yes).await?;
        }
        Commands::List => {
            commands::list::handle(&state_dir).await?;
        }
        Commands::Status => {
            commands::status::handle(&state_dir).await?;
        }
        Commands::Start { target } => {
            commands::lifecycle::handle(&state_dir, hostfy_engine::LifecycleAction::Start, &target)
                .await?;
        }
        Commands::Stop { target } => {
            commands::lifecycle::handle(&state_dir, hostfy_engine::LifecycleAction::Stop, &target)
                .await?;
        }
        Commands::Restart { target } => {
            commands::lifecycle::handle(
                &state_dir,
                hostfy_engine::LifecycleAction::Restart,
                &target,
            )
            .await?;
        }
        Commands::Logs {
            name,
            container,
            tail,
            follow,
        } => {
            commands::logs::handle(&state_dir, name, container, tail, follow).await?;
        }
        Commands::Secrets { name } => {
            commands::secrets::handle(&state_dir, name).await?;
        }
        Commands::Db(db_cmd) => match db_cmd {
            DbCommands::List => {
                commands::db::handle_list(&state_dir).await?;
            }
            DbCommands::Remove { database, force } => {
                commands::db::handle_remove(&state_dir, database, force).await?;
            }
        },
    }

    Ok(())
}
