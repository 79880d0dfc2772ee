use crate::error::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// ログ行のストリーム
pub type LogStream = BoxStream<'static, Result<String>>;

/// コンテナランタイムのトレイト
///
/// エンジンはこのトレイトだけに依存する。Docker実装は [`crate::DockerRuntime`]。
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// 共有ネットワークを用意（既に存在すれば何もしない）
    async fn ensure_network(&self, name: &str) -> Result<()>;

    async fn pull_image(&self, image: &str) -> Result<()>;

    /// コンテナを作成し、IDを返す
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// 既に起動している場合も成功とする
    async fn start_container(&self, name: &str) -> Result<()>;

    /// 既に停止している場合も成功とする
    async fn stop_container(&self, name: &str) -> Result<()>;

    async fn restart_container(&self, name: &str) -> Result<()>;

    async fn remove_container(&self, name: &str, force: bool) -> Result<()>;

    /// コンテナの状態。存在しなければ `None`
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>>;

    /// `key=value` ラベルを持つコンテナ名（停止中も含む）
    async fn list_by_label(&self, key: &str, value: &str) -> Result<Vec<String>>;

    async fn logs(&self, name: &str, tail: usize, follow: bool) -> Result<LogStream>;

    /// healthy になるまで待機（タイムアウトで [`crate::ContainerError::HealthTimeout`]）
    async fn wait_healthy(&self, name: &str, timeout: Duration) -> Result<()>;

    /// 起動中のコンテナ内でコマンドを実行
    async fn exec(&self, name: &str, cmd: &[String]) -> Result<ExecOutput>;

    /// 指定したボリュームを削除する
    ///
    /// 1つの失敗では止まらず、残りも削除を試みる。存在しないボリュームは無視する。
    async fn remove_volumes(&self, names: &[String]) -> Result<VolumeRemoval>;

    async fn container_exists(&self, name: &str) -> Result<bool> {
        Ok(self.inspect_container(name).await?.is_some())
    }

    async fn container_running(&self, name: &str) -> Result<bool> {
        Ok(self
            .inspect_container(name)
            .await?
            .is_some_and(|info| info.state == ContainerState::Running))
    }
}

/// 作成するコンテナの仕様
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: BTreeMap<String, String>,
    /// "volume:/path" または "/host:/path[:ro]"
    pub volumes: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub labels: HashMap<String, String>,
    pub command: Vec<String>,
    pub restart: RestartPolicy,
    pub network: String,
    pub healthcheck: Option<HealthcheckSpec>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    /// コマンド文字列を空白で分割して設定
    pub fn with_command_line(mut self, command: &str) -> Self {
        self.command = command.split_whitespace().map(String::from).collect();
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_volumes(mut self, volumes: Vec<String>) -> Self {
        self.volumes = volumes;
        self
    }

    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }
}

/// コンテナポート → ホストポート
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub container: u16,
    pub host: u16,
}

impl PortMapping {
    pub fn same(port: u16) -> Self {
        Self {
            container: port,
            host: port,
        }
    }

    /// "5432" または "15432:5432"（ホスト:コンテナ）を解析
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().trim_end_matches("/tcp");
        match value.split_once(':') {
            Some((host, container)) => Some(Self {
                container: container.parse().ok()?,
                host: host.parse().ok()?,
            }),
            None => value.parse().ok().map(Self::same),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    Always,
    #[default]
    UnlessStopped,
}

impl RestartPolicy {
    /// "always" 以外はすべて unless-stopped
    pub fn parse(value: &str) -> Self {
        if value == "always" {
            RestartPolicy::Always
        } else {
            RestartPolicy::UnlessStopped
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthcheckSpec {
    pub test: Vec<String>,
    pub interval: Duration,
    pub retries: u32,
}

/// コンテナのステータス
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub health: HealthState,
}

/// コンテナの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    Paused,
    Unknown,
}

/// ヘルスチェックの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Starting,
    /// ヘルスチェック未設定
    NotConfigured,
}

/// ボリューム削除の結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeRemoval {
    pub removed: Vec<String>,
    /// (ボリューム名, 理由)
    pub failed: Vec<(String, String)>,
}

/// exec の結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    pub exit_code: i64,
    /// stdout と stderr を連結したもの
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
