pub mod error;

pub use error::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 状態ディレクトリの既定値
pub const DEFAULT_STATE_DIR: &str = "/etc/hostfy";

/// 状態ディレクトリを上書きする環境変数
pub const STATE_DIR_ENV: &str = "HOSTFY_DIR";

pub const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/hostfy/catalog/main/catalog.json";

pub const DEFAULT_NETWORK: &str = "hostfy_network";

/// hostfyの状態ディレクトリを取得
///
/// 以下の優先順位で決定:
/// 1. 環境変数 HOSTFY_DIR
/// 2. /etc/hostfy
pub fn state_dir() -> PathBuf {
    match std::env::var(STATE_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_STATE_DIR),
    }
}

/// グローバル設定（config.json）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_updated_at: Option<DateTime<Utc>>,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub traefik: TraefikSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraefikSettings {
    #[serde(default)]
    pub dashboard: bool,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            catalog_url: default_catalog_url(),
            catalog_updated_at: None,
            network: default_network(),
            traefik: TraefikSettings::default(),
        }
    }
}

impl GlobalConfig {
    /// 状態ディレクトリから設定を読み込む。ファイルがなければ既定値
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, content).map_err(|source| ConfigError::Io { path, source })
    }
}
