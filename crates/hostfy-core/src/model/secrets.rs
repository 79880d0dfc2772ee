use super::AppConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// インストール全体で共有するシークレット
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSecrets {
    #[serde(default)]
    pub postgres_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_password: Option<String>,
    #[serde(default)]
    pub system_key: String,
}

/// パージせずに削除したアプリの機密値（再インストール時に再利用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSecretsBackup {
    pub name: String,
    pub catalog_app: String,
    pub secrets: BTreeMap<String, String>,
    pub backuped_at: DateTime<Utc>,
}

/// 名前だけでは判定できない既知の機密キー
const WELL_KNOWN_SENSITIVE_KEYS: &[&str] = &[
    "N8N_ENCRYPTION_KEY",
    "SECRET_KEY_BASE",
    "AUTHENTICATION_API_KEY",
    "MINIO_ROOT_USER",
    "MINIO_ROOT_PASSWORD",
];

const SENSITIVE_FRAGMENTS: &[&str] = &["KEY", "SECRET", "PASSWORD"];

pub fn is_sensitive_key(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    WELL_KNOWN_SENSITIVE_KEYS.contains(&upper.as_str())
        || SENSITIVE_FRAGMENTS.iter().any(|f| upper.contains(f))
}

impl AppSecretsBackup {
    /// アプリ記録から機密値を抽出する。該当がなければ `None`
    pub fn from_app(app: &AppConfig) -> Option<Self> {
        let secrets: BTreeMap<String, String> = app
            .all_env()
            .filter(|(key, _)| is_sensitive_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if secrets.is_empty() {
            return None;
        }

        Some(Self {
            name: app.name.clone(),
            catalog_app: app.catalog_app.clone(),
            secrets,
            backuped_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_key_patterns() {
        assert!(is_sensitive_key("N8N_ENCRYPTION_KEY"));
        assert!(is_sensitive_key("DB_PASSWORD"));
        assert!(is_sensitive_key("jwt_secret"));
        assert!(is_sensitive_key("MINIO_ROOT_USER"));
        assert!(!is_sensitive_key("TZ"));
        assert!(!is_sensitive_key("DB_HOST"));
    }

    #[test]
    fn test_backup_filters_sensitive_values() {
        let mut app = AppConfig::new("n8n", "n8n", "n8n.example.com");
        app.env.insert("N8N_ENCRYPTION_KEY".into(), "abc".into());
        app.env.insert("TZ".into(), "UTC".into());

        let backup = AppSecretsBackup::from_app(&app).unwrap();
        assert_eq!(backup.catalog_app, "n8n");
        assert_eq!(backup.secrets.len(), 1);
        assert_eq!(backup.secrets["N8N_ENCRYPTION_KEY"], "abc");
    }

    #[test]
    fn test_no_backup_without_sensitive_values() {
        let mut app = AppConfig::new("uptime", "uptime", "");
        app.env.insert("TZ".into(), "UTC".into());
        assert!(AppSecretsBackup::from_app(&app).is_none());
    }
}
