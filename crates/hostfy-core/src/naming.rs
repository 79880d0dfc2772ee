//! 命名規則
//!
//! コンテナ名・データベース名・共有サービスのホスト名はすべてここで導出する。

use crate::error::{CoreError, Result};
use std::collections::BTreeMap;

/// 管理対象コンテナが接続する共有ネットワーク
pub const NETWORK_NAME: &str = "hostfy_network";

/// 共有PostgreSQLの管理ユーザー
pub const DATABASE_USER: &str = "hostfy";

pub const POSTGRES_SERVICE: &str = "postgres";
pub const REDIS_SERVICE: &str = "redis";
pub const PROXY_SERVICE: &str = "traefik";

/// 共有サービスのコンテナ名（= ネットワーク内のホスト名）
pub fn service_container_name(service: &str) -> String {
    format!("hostfy_{}", service)
}

/// スタック名からデータベース名を導出
///
/// 例: "My-App" -> "my_app_db"
pub fn database_name(stack_name: &str) -> String {
    format!("{}_db", stack_name.replace('-', "_").to_lowercase())
}

/// スタックメンバーのランタイム上のコンテナ名
///
/// 例: ("n8n", "worker") -> "n8n-worker"
pub fn member_runtime_name(stack_name: &str, container_name: &str) -> String {
    format!("{}-{}", stack_name, container_name)
}

/// テンプレートの `SERVICE_<svc>_HOST` が参照するホスト名の対応表
pub fn default_service_hosts() -> BTreeMap<String, String> {
    [POSTGRES_SERVICE, REDIS_SERVICE]
        .into_iter()
        .map(|svc| (svc.to_string(), service_container_name(svc)))
        .collect()
}

/// 共有サービスと衝突する名前
///
/// `hostfy` と `hostfy_*` は共有サービスのコンテナ名・ボリューム名に使われる。
pub fn is_reserved_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "hostfy" || lower.starts_with("hostfy_")
}

/// アプリ名（スタック名）を検証
///
/// コンテナ名・ファイル名の両方に使われるため、英数字で始まり
/// 英数字・'-'・'_' のみで構成される必要がある。
pub fn validate_app_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_head = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid_head && valid_tail {
        Ok(())
    } else {
        Err(CoreError::InvalidName(name.to_string()))
    }
}
