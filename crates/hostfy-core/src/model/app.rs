use crate::naming::member_runtime_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// インストール済みアプリの記録（スタック名ごとに1つ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub catalog_app: String,
    #[serde(default)]
    pub domain: String,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub image: String,
    pub image_pulled_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_id: String,
    /// 共有PostgreSQL上のデータベース名（依存しない場合は空）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database: String,
    /// スタック全体の解決済み環境変数
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_stack: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ContainerConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shared_env: BTreeMap<String, String>,
}

/// コンテナ1つ分の記録
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: String,
    #[serde(default)]
    pub container_id: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_main: bool,
}

fn is_zero(value: &u16) -> bool {
    *value == 0
}

impl AppConfig {
    pub fn new(
        name: impl Into<String>,
        catalog_app: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            catalog_app: catalog_app.into(),
            domain: domain.into(),
            installed_at: now,
            updated_at: now,
            image: String::new(),
            image_pulled_at: now,
            container_id: String::new(),
            database: String::new(),
            env: BTreeMap::new(),
            volumes: Vec::new(),
            command: String::new(),
            port: 0,
            is_stack: false,
            containers: Vec::new(),
            shared_env: BTreeMap::new(),
        }
    }

    /// 旧形式（containers を持たない単一コンテナ記録）を1要素のコンテナ一覧に揃える
    pub fn normalize(&mut self) {
        if self.is_stack || !self.containers.is_empty() || self.image.is_empty() {
            return;
        }
        self.containers.push(ContainerConfig {
            name: self.name.clone(),
            container_id: self.container_id.clone(),
            image: self.image.clone(),
            domain: self.domain.clone(),
            port: self.port,
            command: self.command.clone(),
            env: self.env.clone(),
            volumes: self.volumes.clone(),
            is_main: true,
        });
    }

    /// 単一コンテナ形式のトップレベル項目をコンテナ記録から反映する
    pub fn sync_legacy_fields(&mut self) {
        if self.is_stack {
            return;
        }
        if let Some(c) = self.containers.first() {
            self.image = c.image.clone();
            self.container_id = c.container_id.clone();
            self.port = c.port;
            self.command = c.command.clone();
            self.env = c.env.clone();
            self.volumes = c.volumes.clone();
        }
    }

    /// ランタイム上のコンテナ名
    pub fn runtime_name(&self, container: &ContainerConfig) -> String {
        if self.is_stack {
            member_runtime_name(&self.name, &container.name)
        } else {
            self.name.clone()
        }
    }

    /// このアプリが所有するはずのコンテナ名すべて
    pub fn runtime_names(&self) -> Vec<String> {
        if self.containers.is_empty() {
            return vec![self.name.clone()];
        }
        self.containers
            .iter()
            .map(|c| self.runtime_name(c))
            .collect()
    }

    /// 記録に宣言された名前付きボリューム（バインドマウントは含まない）
    pub fn named_volumes(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .volumes
            .iter()
            .chain(self.containers.iter().flat_map(|c| c.volumes.iter()))
            .filter_map(|volume| volume.split_once(':').map(|(source, _)| source))
            .filter(|source| {
                !source.is_empty() && !source.contains('/') && !source.starts_with('.')
            })
            .map(String::from)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn main_container(&self) -> Option<&ContainerConfig> {
        self.containers
            .iter()
            .find(|c| c.is_main)
            .or_else(|| self.containers.first())
    }

    pub fn find_container(&self, name: &str) -> Option<&ContainerConfig> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// env・shared_env・各コンテナのenvを走査する
    pub fn all_env(&self) -> impl Iterator<Item = (&String, &String)> {
        self.env
            .iter()
            .chain(self.shared_env.iter())
            .chain(self.containers.iter().flat_map(|c| c.env.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_single_record_is_normalized() {
        let json = r#"{
            "name": "uptime",
            "catalog_app": "uptime",
            "domain": "status.example.com",
            "installed_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z",
            "image": "louislam/uptime-kuma:1",
            "image_pulled_at": "2024-05-01T10:00:00Z",
            "container_id": "abc123",
            "env": {"TZ": "UTC"},
            "port": 3001
        }"#;
        let mut app: AppConfig = serde_json::from_str(json).unwrap();
        app.normalize();

        assert_eq!(app.containers.len(), 1);
        let c = &app.containers[0];
        assert!(c.is_main);
        assert_eq!(c.name, "uptime");
        assert_eq!(c.port, 3001);
        assert_eq!(app.runtime_names(), vec!["uptime".to_string()]);
    }

    #[test]
    fn test_stack_runtime_names() {
        let mut app = AppConfig::new("a", "demo", "a.example.com");
        app.is_stack = true;
        for name in ["x", "y"] {
            app.containers.push(ContainerConfig {
                name: name.to_string(),
                image: "busybox".to_string(),
                ..Default::default()
            });
        }
        assert_eq!(app.runtime_names(), vec!["a-x".to_string(), "a-y".to_string()]);
        // is_main が無ければ先頭がメイン
        assert_eq!(app.main_container().unwrap().name, "x");
    }

    #[test]
    fn test_sync_legacy_fields_ignores_stacks() {
        let mut app = AppConfig::new("a", "demo", "");
        app.is_stack = true;
        app.containers.push(ContainerConfig {
            name: "x".to_string(),
            image: "busybox".to_string(),
            ..Default::default()
        });
        app.sync_legacy_fields();
        assert!(app.image.is_empty());
    }

    #[test]
    fn test_all_env_covers_every_scope() {
        let mut app = AppConfig::new("a", "demo", "");
        app.env.insert("A".into(), "1".into());
        app.shared_env.insert("B".into(), "2".into());
        app.containers.push(ContainerConfig {
            name: "x".into(),
            image: "busybox".into(),
            env: BTreeMap::from([("C".to_string(), "3".to_string())]),
            ..Default::default()
        });
        let keys: Vec<_> = app.all_env().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_named_volumes_skip_bind_mounts() {
        let mut app = AppConfig::new("blog", "uptime", "");
        app.volumes = vec!["blog_data:/app/data".to_string()];
        app.containers.push(ContainerConfig {
            name: "blog".into(),
            image: "busybox".into(),
            volumes: vec![
                "blog_data:/app/data".to_string(),
                "/srv/blog:/srv:ro".to_string(),
                "./uploads:/uploads".to_string(),
                "blog_cache:/cache".to_string(),
            ],
            ..Default::default()
        });
        assert_eq!(app.named_volumes(), vec!["blog_cache", "blog_data"]);
    }
}
