//! コンテナラベル
//!
//! リバースプロキシ（Traefik）のルーティング設定と、hostfy管理下であることを示す
//! メタデータをラベルとして付与する。

use std::collections::HashMap;

pub const MANAGED_LABEL: &str = "hostfy.managed";
pub const APP_LABEL: &str = "hostfy.app";
pub const DOMAIN_LABEL: &str = "hostfy.domain";
pub const SERVICE_LABEL: &str = "hostfy.service";

/// ACME証明書リゾルバ名（プロキシの起動引数と一致させる）
pub const CERT_RESOLVER: &str = "hostfyresolver";

/// 管理対象であることだけを示すラベル
pub fn managed_labels(name: &str) -> HashMap<String, String> {
    HashMap::from([
        (MANAGED_LABEL.to_string(), "true".to_string()),
        (APP_LABEL.to_string(), name.to_string()),
    ])
}

/// 共有サービス用のラベル
pub fn service_labels(service: &str) -> HashMap<String, String> {
    HashMap::from([
        (MANAGED_LABEL.to_string(), "true".to_string()),
        (SERVICE_LABEL.to_string(), service.to_string()),
    ])
}

/// ドメインとポートからルーティングラベルを生成
///
/// ルーター名には `-` を使えないため `_` に置き換える。
pub fn routing_labels(name: &str, domain: &str, port: u16) -> HashMap<String, String> {
    let safe = name.replace('-', "_");
    let mut labels = managed_labels(name);
    labels.extend([
        ("traefik.enable".to_string(), "true".to_string()),
        (
            format!("traefik.http.routers.{}.rule", safe),
            format!("Host(`{}`)", domain),
        ),
        (
            format!("traefik.http.routers.{}.entrypoints", safe),
            "websecure".to_string(),
        ),
        (
            format!("traefik.http.routers.{}.tls.certresolver", safe),
            CERT_RESOLVER.to_string(),
        ),
        (
            format!("traefik.http.services.{}.loadbalancer.server.port", safe),
            port.to_string(),
        ),
        (DOMAIN_LABEL.to_string(), domain.to_string()),
    ]);
    labels
}

/// ドメインとポートが揃っている場合のみルーティングラベルを付ける
pub fn container_labels(name: &str, domain: &str, port: u16) -> HashMap<String, String> {
    if !domain.is_empty() && port > 0 {
        routing_labels(name, domain, port)
    } else {
        managed_labels(name)
    }
}
