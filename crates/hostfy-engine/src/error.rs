use hostfy_container::ContainerError;
use hostfy_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(
        "カタログを取得できません: {url}\n理由: {message}\n\nヒント:\n  • ネットワーク接続を確認してください\n  • hostfy init --catalog-url で取得先を変更できます"
    )]
    CatalogUnavailable { url: String, message: String },

    #[error(
        "カタログに '{0}' が見つかりません\n\nヒント:\n  • hostfy catalog で利用可能なアプリを確認してください\n  • hostfy catalog --refresh でカタログを更新してください"
    )]
    CatalogEntryNotFound(String),

    #[error(
        "アプリ '{0}' は既にインストールされています\n\nヒント:\n  • --name で別の名前を指定してください\n  • 設定の変更は hostfy update を使用してください"
    )]
    AlreadyInstalled(String),

    #[error("依存サービス '{service}' を起動できませんでした\n理由: {source}")]
    DependencyStartFailed {
        service: String,
        #[source]
        source: ContainerError,
    },

    #[error(
        "データベース '{database}' の操作に失敗しました: {message}\n\nヒント:\n  • hostfy status で hostfy_postgres の状態を確認してください"
    )]
    DatabaseOperationFailed { database: String, message: String },

    #[error(
        "データベース '{database}' はアプリ '{app}' が使用中です\n\nヒント:\n  • hostfy remove {app} --purge でアプリとデータベースをまとめて削除してください"
    )]
    DatabaseInUse { database: String, app: String },

    #[error("コンテナ '{container}' の操作に失敗しました\n理由: {source}")]
    ContainerOperationFailed {
        container: String,
        #[source]
        source: ContainerError,
    },

    #[error(
        "コンテナ '{container}' が {timeout_secs} 秒以内に healthy になりませんでした\n\nヒント:\n  • hostfy logs でログを確認してください"
    )]
    HealthTimeout { container: String, timeout_secs: u64 },

    /// 処理は継続する。レポートの注意事項としてのみ使う
    #[error("未解決のプレースホルダーがあります: {}", .0.join(", "))]
    TemplateUnresolved(Vec<String>),

    #[error(
        "アプリ '{0}' はインストールされていません\n\nヒント:\n  • hostfy list でインストール済みのアプリを確認してください"
    )]
    StateRecordNotFound(String),

    #[error("アプリ '{app}' の記録を保存できませんでした\n理由: {source}")]
    StateWriteFailed {
        app: String,
        #[source]
        source: CoreError,
    },

    #[error(
        "アプリ '{app}' にコンテナ '{container}' はありません（利用可能: {}）",
        .available.join(", ")
    )]
    UnknownContainer {
        app: String,
        container: String,
        available: Vec<String>,
    },

    #[error("無効な名前です: '{0}'（英数字で始まり、英数字・'-'・'_' のみ使用できます）")]
    InvalidName(String),

    #[error(
        "名前 '{0}' は共有サービス用に予約されています\n\nヒント:\n  • --name で 'hostfy' / 'hostfy_' で始まらない名前を指定してください"
    )]
    ReservedName(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] hostfy_config::ConfigError),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl EngineError {
    pub(crate) fn container(container: impl Into<String>) -> impl FnOnce(ContainerError) -> Self {
        let container = container.into();
        move |source| match source {
            ContainerError::HealthTimeout {
                container,
                timeout_secs,
            } => EngineError::HealthTimeout {
                container,
                timeout_secs,
            },
            source => EngineError::ContainerOperationFailed { container, source },
        }
    }

    pub(crate) fn write_failed(app: impl Into<String>) -> impl FnOnce(CoreError) -> Self {
        let app = app.into();
        move |source| EngineError::StateWriteFailed { app, source }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_timeout_is_lifted() {
        let err = EngineError::container("n8n-editor")(ContainerError::HealthTimeout {
            container: "n8n-editor".to_string(),
            timeout_secs: 120,
        });
        assert!(matches!(err, EngineError::HealthTimeout { timeout_secs: 120, .. }));
    }

    #[test]
    fn test_container_failure_keeps_name() {
        let err = EngineError::container("n8n-worker")(ContainerError::DockerApiError(
            "boom".to_string(),
        ));
        match err {
            EngineError::ContainerOperationFailed { container, .. } => {
                assert_eq!(container, "n8n-worker")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_message_lists_tokens() {
        let err = EngineError::TemplateUnresolved(vec!["FOO".to_string(), "BAR".to_string()]);
        assert!(err.to_string().contains("FOO, BAR"));
    }
}
