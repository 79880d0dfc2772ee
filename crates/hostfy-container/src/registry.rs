//! プライベートレジストリの認証情報

use base64::Engine;
use bollard::auth::DockerCredentials;
use std::path::Path;

/// ~/.docker/config.json からレジストリの認証情報を取得
pub fn get_docker_credentials(registry: &str) -> Option<DockerCredentials> {
    let config_path = dirs::home_dir()?.join(".docker").join("config.json");
    credentials_from_file(&config_path, registry)
}

fn credentials_from_file(path: &Path, registry: &str) -> Option<DockerCredentials> {
    let content = std::fs::read_to_string(path).ok()?;
    let config: serde_json::Value = serde_json::from_str(&content).ok()?;

    let auth_b64 = config
        .get("auths")?
        .as_object()?
        .get(registry)?
        .get("auth")?
        .as_str()?;

    // username:password
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth_b64)
        .ok()?;
    let auth_str = String::from_utf8(decoded).ok()?;
    let (username, password) = auth_str.split_once(':')?;

    Some(DockerCredentials {
        username: Some(username.to_string()),
        password: Some(password.to_string()),
        serveraddress: Some(registry.to_string()),
        ..Default::default()
    })
}

/// イメージ名からレジストリを抽出
///
/// 最初の `/` より前に `.` か `:` があればレジストリとみなす（ghcr.io, localhost:5000）。
pub fn extract_registry(image: &str) -> Option<&str> {
    let (first, _) = image.split_once('/')?;
    (first.contains('.') || first.contains(':')).then_some(first)
}
