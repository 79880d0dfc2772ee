//! 永続状態ストア
//!
//! 状態ディレクトリ配下のJSONファイルを読み書きする唯一の窓口。
//!
//! ```text
//! <state_dir>/
//!   config.json           グローバル設定
//!   secrets.json          システムシークレット (0600)
//!   apps/<name>.json      インストール済みアプリの記録
//!   backups/<name>.json   削除済みアプリの機密値 (0600)
//!   catalog_cache.json    カタログキャッシュ
//! ```

use crate::error::{CoreError, Result};
use crate::model::{AppConfig, AppSecretsBackup, SystemSecrets};
use crate::naming::validate_app_name;
use crate::secret::{generate_password, generate_secret};
use chrono::Utc;
use hostfy_config::GlobalConfig;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SECRETS_FILE: &str = "secrets.json";
const APPS_DIR: &str = "apps";
const BACKUPS_DIR: &str = "backups";
const CATALOG_CACHE_FILE: &str = "catalog_cache.json";

/// 共有DBパスワードの長さ
const DATABASE_PASSWORD_LENGTH: usize = 24;
/// システムキーの長さ（16進文字数）
const SYSTEM_KEY_LENGTH: usize = 64;

#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.root.join(APPS_DIR)
    }

    pub fn app_path(&self, name: &str) -> PathBuf {
        self.apps_dir().join(format!("{}.json", name))
    }

    pub fn backup_path(&self, name: &str) -> PathBuf {
        self.root.join(BACKUPS_DIR).join(format!("{}.json", name))
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.root.join(SECRETS_FILE)
    }

    pub fn catalog_cache_path(&self) -> PathBuf {
        self.root.join(CATALOG_CACHE_FILE)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.root.clone(), self.apps_dir(), self.root.join(BACKUPS_DIR)] {
            std::fs::create_dir_all(&dir).map_err(|e| CoreError::io(&dir, e))?;
        }
        Ok(())
    }

    // --- グローバル設定 ---

    pub fn load_config(&self) -> Result<GlobalConfig> {
        Ok(GlobalConfig::load(&self.root)?)
    }

    pub fn save_config(&self, config: &GlobalConfig) -> Result<()> {
        Ok(config.save(&self.root)?)
    }

    // --- システムシークレット ---

    pub fn load_secrets(&self) -> Result<SystemSecrets> {
        Ok(read_json(&self.secrets_path())?.unwrap_or_default())
    }

    pub fn save_secrets(&self, secrets: &SystemSecrets) -> Result<()> {
        self.ensure_directories()?;
        write_json(&self.secrets_path(), secrets, true)
    }

    /// 未生成のシークレットを生成して保存し、現在の値を返す
    ///
    /// 一度生成された値は上書きしない。
    pub fn ensure_secrets(&self) -> Result<SystemSecrets> {
        let mut secrets = self.load_secrets()?;
        let mut changed = false;

        if secrets.postgres_password.is_empty() {
            secrets.postgres_password = generate_password(DATABASE_PASSWORD_LENGTH);
            changed = true;
        }
        if secrets.system_key.is_empty() {
            secrets.system_key = generate_secret(SYSTEM_KEY_LENGTH);
            changed = true;
        }

        if changed {
            info!("Generated system secrets");
            self.save_secrets(&secrets)?;
        }
        Ok(secrets)
    }

    // --- アプリ記録 ---

    pub fn app_exists(&self, name: &str) -> bool {
        self.app_path(name).is_file()
    }

    pub fn load_app(&self, name: &str) -> Result<AppConfig> {
        validate_app_name(name)?;
        let mut app: AppConfig = read_json(&self.app_path(name))?
            .ok_or_else(|| CoreError::RecordNotFound(name.to_string()))?;
        app.normalize();
        Ok(app)
    }

    /// アプリ記録を保存（updated_at を更新する）
    pub fn save_app(&self, app: &mut AppConfig) -> Result<()> {
        validate_app_name(&app.name)?;
        self.ensure_directories()?;
        app.updated_at = Utc::now();
        debug!(app = %app.name, "Saving app record");
        write_json(&self.app_path(&app.name), app, false)
    }

    pub fn delete_app(&self, name: &str) -> Result<()> {
        let path = self.app_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CoreError::RecordNotFound(name.to_string()))
            }
            Err(e) => Err(CoreError::io(path, e)),
        }
    }

    /// すべてのアプリ記録（名前順）
    ///
    /// 読み込めない記録は警告を出して読み飛ばす。
    pub fn list_apps(&self) -> Result<Vec<AppConfig>> {
        let dir = self.apps_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::io(dir, e)),
        };

        let mut apps = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CoreError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<AppConfig>(&path) {
                Ok(Some(mut app)) => {
                    app.normalize();
                    apps.push(app);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable app record"),
            }
        }
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    // --- シークレットのバックアップ ---

    /// 機密値のバックアップを書き出す。対象がなければ何もせず `None`
    pub fn backup_secrets(&self, app: &AppConfig) -> Result<Option<AppSecretsBackup>> {
        let Some(backup) = AppSecretsBackup::from_app(app) else {
            debug!(app = %app.name, "No sensitive values to back up");
            return Ok(None);
        };
        self.ensure_directories()?;
        write_json(&self.backup_path(&app.name), &backup, true)?;
        info!(app = %app.name, keys = backup.secrets.len(), "Backed up app secrets");
        Ok(Some(backup))
    }

    pub fn load_backup(&self, name: &str) -> Result<Option<AppSecretsBackup>> {
        read_json(&self.backup_path(name))
    }

    pub fn backup_exists(&self, name: &str) -> bool {
        self.backup_path(name).is_file()
    }

    /// バックアップを削除（存在しなければ何もしない）
    pub fn delete_backup(&self, name: &str) -> Result<()> {
        let path = self.backup_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::io(path, e)),
        }
    }
}

/// JSONを読み込む。ファイルがなければ `None`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoreError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| CoreError::json(path, e))
}

/// 一時ファイル経由でJSONを書き込む
///
/// `private` の場合はパーミッションを 0600 にする。
pub fn write_json<T: Serialize>(path: &Path, value: &T, private: bool) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| CoreError::json(path, e))?;
    let tmp = path.with_extension("json.tmp");

    std::fs::write(&tmp, content).map_err(|e| CoreError::io(&tmp, e))?;
    if private {
        set_private(&tmp)?;
    }
    std::fs::rename(&tmp, path).map_err(|e| CoreError::io(path, e))
}

#[cfg(unix)]
fn set_private(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| CoreError::io(path, e))
}

#[cfg(not(unix))]
fn set_private(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContainerConfig;

    fn store() -> (tempfile::TempDir, StateStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(temp_dir.path().join("hostfy"));
        (temp_dir, store)
    }

    #[test]
    fn test_ensure_secrets_is_stable() {
        let (_tmp, store) = store();
        let first = store.ensure_secrets().unwrap();
        assert_eq!(first.postgres_password.len(), 24);
        assert_eq!(first.system_key.len(), 64);

        let second = store.ensure_secrets().unwrap();
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn test_secrets_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_tmp, store) = store();
        store.ensure_secrets().unwrap();
        let mode = std::fs::metadata(store.secrets_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_app_round_trip() {
        let (_tmp, store) = store();
        let mut app = AppConfig::new("n8n", "n8n", "n8n.example.com");
        app.is_stack = true;
        app.containers.push(ContainerConfig {
            name: "editor".into(),
            image: "n8nio/n8n".into(),
            is_main: true,
            ..Default::default()
        });

        assert!(!store.app_exists("n8n"));
        store.save_app(&mut app).unwrap();
        assert!(store.app_exists("n8n"));

        let loaded = store.load_app("n8n").unwrap();
        assert_eq!(loaded, app);
    }

    #[test]
    fn test_load_missing_app() {
        let (_tmp, store) = store();
        assert!(matches!(
            store.load_app("ghost"),
            Err(CoreError::RecordNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_delete_missing_app() {
        let (_tmp, store) = store();
        assert!(matches!(
            store.delete_app("ghost"),
            Err(CoreError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_list_apps_sorted_and_skips_broken() {
        let (_tmp, store) = store();
        for name in ["zeta", "alpha"] {
            store.save_app(&mut AppConfig::new(name, name, "")).unwrap();
        }
        std::fs::write(store.app_path("broken"), "{").unwrap();
        std::fs::write(store.apps_dir().join("notes.txt"), "ignored").unwrap();

        let names: Vec<_> = store
            .list_apps()
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_list_apps_without_directory() {
        let (_tmp, store) = store();
        assert!(store.list_apps().unwrap().is_empty());
    }

    #[test]
    fn test_backup_lifecycle() {
        let (_tmp, store) = store();
        let mut app = AppConfig::new("n8n", "n8n", "");
        app.env.insert("N8N_ENCRYPTION_KEY".into(), "secret".into());
        app.env.insert("TZ".into(), "UTC".into());

        let backup = store.backup_secrets(&app).unwrap().unwrap();
        assert_eq!(backup.secrets.len(), 1);
        assert!(store.backup_exists("n8n"));

        let loaded = store.load_backup("n8n").unwrap().unwrap();
        assert_eq!(loaded.secrets["N8N_ENCRYPTION_KEY"], "secret");

        store.delete_backup("n8n").unwrap();
        assert!(!store.backup_exists("n8n"));
        // 二度目の削除もエラーにならない
        store.delete_backup("n8n").unwrap();
    }

    #[test]
    fn test_backup_skipped_without_sensitive_values() {
        let (_tmp, store) = store();
        let app = AppConfig::new("uptime", "uptime", "");
        assert!(store.backup_secrets(&app).unwrap().is_none());
        assert!(!store.backup_exists("uptime"));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let (_tmp, store) = store();
        assert!(matches!(
            store.load_app("../secrets"),
            Err(CoreError::InvalidName(_))
        ));
    }
}
