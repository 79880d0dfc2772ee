//! ContainerSpec から Docker API パラメータへの変換

// Bollard 0.19 の非推奨APIを一時的に使用
#![allow(deprecated)]

use crate::runtime::{ContainerSpec, RestartPolicy};
use bollard::container::{Config, CreateContainerOptions, NetworkingConfig};
use bollard::models::{
    EndpointSettings, HealthConfig, HostConfig, PortBinding, RestartPolicyNameEnum,
};
use std::collections::HashMap;

/// コンテナ停止時の猶予（秒）
pub const STOP_TIMEOUT_SECS: i64 = 30;

/// ContainerSpec を Docker のコンテナ設定に変換
pub fn spec_to_container_config(
    spec: &ContainerSpec,
) -> (Config<String>, CreateContainerOptions<String>) {
    let env: Vec<String> = spec
        .env
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    let mut port_bindings = HashMap::new();
    let mut exposed_ports = HashMap::new();
    for port in &spec.ports {
        let container_port = format!("{}/tcp", port.container);
        exposed_ports.insert(container_port.clone(), HashMap::new());
        port_bindings.insert(
            container_port,
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(port.host.to_string()),
            }]),
        );
    }

    let restart_name = match spec.restart {
        RestartPolicy::Always => RestartPolicyNameEnum::ALWAYS,
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
    };

    let network = (!spec.network.is_empty()).then(|| spec.network.clone());

    let host_config = Some(HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(spec.volumes.clone()),
        network_mode: network.clone(),
        restart_policy: Some(bollard::models::RestartPolicy {
            name: Some(restart_name),
            ..Default::default()
        }),
        ..Default::default()
    });

    // 共有ネットワーク上ではコンテナ名で名前解決できるようにする
    let networking_config = network.map(|network| NetworkingConfig {
        endpoints_config: HashMap::from([(
            network,
            EndpointSettings {
                aliases: Some(vec![spec.name.clone()]),
                ..Default::default()
            },
        )]),
    });

    let healthcheck = spec.healthcheck.as_ref().map(|hc| HealthConfig {
        test: Some(hc.test.clone()),
        interval: Some(hc.interval.as_nanos() as i64),
        retries: Some(hc.retries as i64),
        ..Default::default()
    });

    let config = Config {
        image: Some(spec.image.clone()),
        env: Some(env),
        exposed_ports: Some(exposed_ports),
        host_config,
        labels: Some(spec.labels.clone()),
        cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
        networking_config,
        healthcheck,
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: spec.name.clone(),
        platform: None,
    };

    (config, options)
}

/// "name:tag" をイメージ名とタグに分割
///
/// レジストリのポート指定（`host:5000/app`）はタグとみなさない。タグがなければ "latest"。
pub fn parse_image_tag(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, tag),
        _ => (image, "latest"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{HealthcheckSpec, PortMapping};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn postgres_spec() -> ContainerSpec {
        ContainerSpec {
            name: "hostfy_postgres".to_string(),
            image: "postgres:15-alpine".to_string(),
            env: BTreeMap::from([
                ("POSTGRES_USER".to_string(), "hostfy".to_string()),
                ("POSTGRES_DB".to_string(), "hostfy".to_string()),
            ]),
            volumes: vec!["hostfy_postgres_data:/var/lib/postgresql/data".to_string()],
            ports: vec![PortMapping::same(5432)],
            restart: RestartPolicy::Always,
            network: "hostfy_network".to_string(),
            healthcheck: Some(HealthcheckSpec {
                test: vec![
                    "CMD-SHELL".to_string(),
                    "pg_isready -U hostfy".to_string(),
                ],
                interval: Duration::from_secs(5),
                retries: 5,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_spec_to_container_config_basic() {
        let (config, options) = spec_to_container_config(&postgres_spec());

        assert_eq!(options.name, "hostfy_postgres");
        assert_eq!(config.image, Some("postgres:15-alpine".to_string()));

        let env = config.env.unwrap();
        assert_eq!(env, vec!["POSTGRES_DB=hostfy", "POSTGRES_USER=hostfy"]);
        assert!(config.cmd.is_none());
    }

    #[test]
    fn test_ports_and_binds() {
        let mut spec = postgres_spec();
        spec.ports = vec![PortMapping {
            container: 5432,
            host: 15432,
        }];

        let (config, _) = spec_to_container_config(&spec);
        let host_config = config.host_config.unwrap();

        let bindings = host_config.port_bindings.unwrap();
        let binding = bindings.get("5432/tcp").unwrap().as_ref().unwrap();
        assert_eq!(binding[0].host_port, Some("15432".to_string()));
        assert!(config.exposed_ports.unwrap().contains_key("5432/tcp"));

        assert_eq!(
            host_config.binds.unwrap(),
            vec!["hostfy_postgres_data:/var/lib/postgresql/data"]
        );
    }

    #[test]
    fn test_restart_policy_and_network() {
        let (config, _) = spec_to_container_config(&postgres_spec());
        let host_config = config.host_config.unwrap();

        assert_eq!(
            host_config.restart_policy.unwrap().name,
            Some(RestartPolicyNameEnum::ALWAYS)
        );
        assert_eq!(host_config.network_mode, Some("hostfy_network".to_string()));

        let endpoints = config.networking_config.unwrap().endpoints_config;
        let endpoint = endpoints.get("hostfy_network").unwrap();
        assert_eq!(endpoint.aliases, Some(vec!["hostfy_postgres".to_string()]));
    }

    #[test]
    fn test_without_network() {
        let mut spec = postgres_spec();
        spec.network.clear();

        let (config, _) = spec_to_container_config(&spec);
        assert!(config.networking_config.is_none());
        assert!(config.host_config.unwrap().network_mode.is_none());
    }

    #[test]
    fn test_healthcheck_conversion() {
        let (config, _) = spec_to_container_config(&postgres_spec());
        let health = config.healthcheck.unwrap();

        assert_eq!(health.interval, Some(5_000_000_000));
        assert_eq!(health.retries, Some(5));
        assert_eq!(health.test.unwrap()[0], "CMD-SHELL");
    }

    #[test]
    fn test_command_passed_through() {
        let spec = ContainerSpec::new("hostfy_redis", "redis:7-alpine")
            .with_command_line("redis-server --appendonly yes");

        let (config, _) = spec_to_container_config(&spec);
        assert_eq!(
            config.cmd,
            Some(vec![
                "redis-server".to_string(),
                "--appendonly".to_string(),
                "yes".to_string()
            ])
        );
    }

    #[test]
    fn test_parse_image_tag() {
        assert_eq!(parse_image_tag("postgres:15-alpine"), ("postgres", "15-alpine"));
        assert_eq!(parse_image_tag("n8nio/n8n"), ("n8nio/n8n", "latest"));
        assert_eq!(
            parse_image_tag("registry.local:5000/app"),
            ("registry.local:5000/app", "latest")
        );
        assert_eq!(
            parse_image_tag("registry.local:5000/app:1.2"),
            ("registry.local:5000/app", "1.2")
        );
    }
}
