use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("ファイル操作に失敗しました: {path}\n理由: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSONの解析に失敗しました: {path}\n理由: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "アプリ '{0}' はインストールされていません\n\nヒント:\n  • hostfy list でインストール済みのアプリを確認してください"
    )]
    RecordNotFound(String),

    #[error(transparent)]
    Config(#[from] hostfy_config::ConfigError),

    #[error("無効なアプリ名です: '{0}'（英数字で始まり、英数字・'-'・'_' のみ使用できます）")]
    InvalidName(String),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        CoreError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
