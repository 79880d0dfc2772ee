use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • /var/run/docker.sock へのアクセス権限を確認してください"
    )]
    DockerConnectionFailed(String),

    #[error("コンテナ '{container}' が見つかりません")]
    NotFound { container: String },

    /// 304: 既に目的の状態になっている
    #[error("変更はありません: {0}")]
    NotModified(String),

    #[error("競合が発生しました: {0}\n\nヒント:\n  • 同名のコンテナが既に存在していないか確認してください")]
    Conflict(String),

    #[error(
        "イメージ '{image}' の取得に失敗しました: {message}\n\nヒント:\n  • イメージ名とタグを確認してください\n  • docker pull {image} で手動取得を試してください"
    )]
    ImagePullFailed { image: String, message: String },

    #[error(
        "コンテナ '{container}' が {timeout_secs} 秒以内に healthy になりませんでした\n\nヒント:\n  • hostfy logs でコンテナのログを確認してください"
    )]
    HealthTimeout { container: String, timeout_secs: u64 },

    #[error("Docker APIエラー: {0}")]
    DockerApiError(String),

    #[error("設定エラー: {0}")]
    ConfigError(String),
}

impl ContainerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContainerError::NotFound { .. })
    }
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => ContainerError::NotFound {
                container: message.clone(),
            },
            bollard::errors::Error::DockerResponseServerError {
                status_code: 304,
                message,
            } => ContainerError::NotModified(message.clone()),
            bollard::errors::Error::DockerResponseServerError {
                status_code: 409,
                message,
            } => ContainerError::Conflict(message.clone()),
            _ => {
                let err_str = err.to_string();
                if err_str.contains("Connection refused")
                    || err_str.contains("No such file or directory")
                {
                    ContainerError::DockerConnectionFailed(err_str)
                } else {
                    ContainerError::DockerApiError(err_str)
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
