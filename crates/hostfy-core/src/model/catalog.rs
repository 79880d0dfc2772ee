use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// カタログ全体（リモートから取得し、ローカルにキャッシュされる）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
    #[serde(default)]
    pub apps: BTreeMap<String, App>,
}

/// 共有インフラサービス（データベース・キャッシュなど）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// "5432" または "15432:5432"（ホスト:コンテナ）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Healthcheck {
    #[serde(default)]
    pub test: Vec<String>,
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub retries: u32,
}

/// インストール可能なアプリ
///
/// 単一コンテナ形式（`image` など）かスタック形式（`containers`）の
/// どちらか一方のみが設定される。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    // 単一コンテナ形式
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub console_port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traefik: Option<TraefikConfig>,

    // スタック形式
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shared_env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_env: Vec<UserEnvVar>,
}

/// スタックを構成するコンテナ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traefik: Option<TraefikConfig>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_main: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_env: Vec<UserEnvVar>,
}

/// インストール時にユーザーへ問い合わせる環境変数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEnvVar {
    pub key: String,
    #[serde(default)]
    pub prompt: String,
    /// プレースホルダーを含んでもよい
    #[serde(default)]
    pub default: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraefikConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<TraefikRoute>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraefikRoute {
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub port: u16,
}

fn is_zero(value: &u16) -> bool {
    *value == 0
}

/// アプリの形状（単一コンテナ or スタック）
#[derive(Debug, Clone, Copy)]
pub enum AppShape<'a> {
    Single(&'a App),
    Stack {
        containers: &'a [Container],
        shared_env: &'a BTreeMap<String, String>,
    },
}

/// 形状を問わず、1つのコンテナとして扱うためのビュー
#[derive(Debug, Clone, Copy)]
pub struct ContainerTemplate<'a> {
    /// スタックメンバー名。単一コンテナの場合は `None`（スタック名を使う）
    pub name: Option<&'a str>,
    pub image: &'a str,
    pub port: u16,
    pub command: &'a str,
    /// コンテナ固有の環境変数（スタック共通分を除く）
    pub env: Option<&'a BTreeMap<String, String>>,
    pub volumes: &'a [String],
    pub route: Option<&'a TraefikRoute>,
    pub is_main: bool,
    pub user_env: &'a [UserEnvVar],
}

impl App {
    pub fn is_stack(&self) -> bool {
        !self.containers.is_empty()
    }

    pub fn shape(&self) -> AppShape<'_> {
        if self.is_stack() {
            AppShape::Stack {
                containers: &self.containers,
                shared_env: &self.shared_env,
            }
        } else {
            AppShape::Single(self)
        }
    }

    /// メインコンテナのインデックス（`is_main` がなければ先頭）
    pub fn main_container_index(&self) -> Option<usize> {
        if self.containers.is_empty() {
            return None;
        }
        Some(self.containers.iter().position(|c| c.is_main).unwrap_or(0))
    }

    pub fn main_container(&self) -> Option<&Container> {
        self.main_container_index().map(|i| &self.containers[i])
    }

    /// スタック全体に適用される環境変数（スタックは shared_env、単一は env）
    pub fn stack_env(&self) -> &BTreeMap<String, String> {
        match self.shape() {
            AppShape::Single(app) => &app.env,
            AppShape::Stack { shared_env, .. } => shared_env,
        }
    }

    /// 宣言順のコンテナ一覧
    pub fn container_templates(&self) -> Vec<ContainerTemplate<'_>> {
        match self.shape() {
            AppShape::Single(app) => vec![ContainerTemplate {
                name: None,
                image: &app.image,
                port: app.port,
                command: &app.command,
                env: None,
                volumes: &app.volumes,
                route: None,
                is_main: true,
                user_env: &[],
            }],
            AppShape::Stack { containers, .. } => {
                let main = self.main_container_index().unwrap_or(0);
                containers
                    .iter()
                    .enumerate()
                    .map(|(i, c)| ContainerTemplate {
                        name: Some(&c.name),
                        image: &c.image,
                        port: c.port,
                        command: &c.command,
                        env: Some(&c.env),
                        volumes: &c.volumes,
                        route: c.traefik.as_ref().and_then(|t| t.routes.first()),
                        is_main: i == main,
                        user_env: &c.user_env,
                    })
                    .collect()
            }
        }
    }

    /// 指定コンテナの現在のカタログイメージ
    ///
    /// 単一コンテナアプリでは `container` を無視してアプリのイメージを返す。
    pub fn image_for(&self, container: &str) -> Option<&str> {
        match self.shape() {
            AppShape::Single(app) => Some(app.image.as_str()),
            AppShape::Stack { containers, .. } => containers
                .iter()
                .find(|c| c.name == container)
                .map(|c| c.image.as_str()),
        }
    }
}
