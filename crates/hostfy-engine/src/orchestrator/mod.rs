//! デプロイのワークフロー
//!
//! 単一コンテナアプリもスタックも [`ContainerPlan`] の列として扱う。
//! 単一コンテナアプリはスタック名をコンテナ名とするメインコンテナ1つだけの列になる。

mod install;
mod remove;
mod update;
mod upgrade;

pub use install::{InstallReport, InstallRequest, install};
pub use remove::{RemoveReport, RemoveRequest, remove};
pub use update::{UpdateReport, UpdateRequest, update};
pub use upgrade::{ImageChange, UpgradeReport, UpgradeRequest, upgrade};

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use hostfy_container::{ContainerSpec, RestartPolicy};
use hostfy_core::labels::container_labels;
use hostfy_core::naming::member_runtime_name;
use hostfy_core::{
    AppConfig, ContainerConfig, CoreError, StateStore, TemplateContext, UserEnvVar,
    resolve_references,
};
use std::collections::BTreeMap;
use tracing::debug;

/// 1コンテナ分の作成計画
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerPlan {
    pub runtime_name: String,
    pub record: ContainerConfig,
}

impl ContainerPlan {
    pub fn new(stack_name: &str, is_stack: bool, record: ContainerConfig) -> Self {
        let runtime_name = if is_stack {
            member_runtime_name(stack_name, &record.name)
        } else {
            stack_name.to_string()
        };
        Self {
            runtime_name,
            record,
        }
    }

    /// インストール済み記録のコンテナ一覧から計画を作る
    pub fn from_app(app: &AppConfig) -> Vec<Self> {
        app.containers
            .iter()
            .map(|c| Self::new(&app.name, app.is_stack, c.clone()))
            .collect()
    }

    pub fn is_main(&self) -> bool {
        self.record.is_main
    }

    /// ルーティングラベルはドメインとポートの両方がある場合のみ付く
    pub fn container_spec(&self, network: &str) -> ContainerSpec {
        let record = &self.record;
        ContainerSpec::new(&self.runtime_name, &record.image)
            .with_command_line(&record.command)
            .with_env(record.env.clone())
            .with_volumes(record.volumes.clone())
            .with_labels(container_labels(
                &self.runtime_name,
                &record.domain,
                record.port,
            ))
            .with_restart(RestartPolicy::Always)
            .with_network(network)
    }
}

/// コンテナを作成して起動し、IDを返す
pub(crate) async fn launch(ctx: &EngineContext, plan: &ContainerPlan) -> Result<String> {
    let spec = plan.container_spec(&ctx.settings.network);
    let runtime = ctx.runtime.as_ref();
    let id = runtime
        .create_container(&spec)
        .await
        .map_err(EngineError::container(&plan.runtime_name))?;
    runtime
        .start_container(&plan.runtime_name)
        .await
        .map_err(EngineError::container(&plan.runtime_name))?;
    Ok(id)
}

/// 既存コンテナを停止・削除してから作り直す
pub(crate) async fn recreate(ctx: &EngineContext, plan: &ContainerPlan) -> Result<String> {
    let runtime = ctx.runtime.as_ref();
    let name = &plan.runtime_name;

    match runtime.stop_container(name).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => debug!(container = %name, "Nothing to stop"),
        Err(e) => return Err(EngineError::container(name)(e)),
    }
    match runtime.remove_container(name, true).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => debug!(container = %name, "Nothing to remove"),
        Err(e) => return Err(EngineError::container(name)(e)),
    }
    launch(ctx, plan).await
}

/// 記録を読み込む（存在しなければ StateRecordNotFound）
pub(crate) fn load_record(ctx: &EngineContext, name: &str) -> Result<AppConfig> {
    read_record(&ctx.store, name)
}

pub(crate) fn read_record(store: &StateStore, name: &str) -> Result<AppConfig> {
    store.load_app(name).map_err(|e| match e {
        CoreError::RecordNotFound(name) => EngineError::StateRecordNotFound(name),
        CoreError::InvalidName(name) => EngineError::InvalidName(name),
        other => EngineError::Core(other),
    })
}

/// 利用者が明示しなかったキーについて UserEnvVar の既定値を解決する
///
/// 既定値は自身のキーで解決するため、引き継いだシークレットがあればそちらが使われる。
/// 解決した値は `resolved` にも記録する（インストール後の表示用）。
pub(crate) fn apply_user_env(
    tmpl: &mut TemplateContext,
    vars: &[UserEnvVar],
    overrides: &BTreeMap<String, String>,
    env: &mut BTreeMap<String, String>,
    resolved: &mut BTreeMap<String, String>,
) {
    for var in vars {
        let value = match overrides.get(&var.key) {
            Some(value) => value.clone(),
            None => {
                let value = tmpl.resolve_entry(&var.key, &var.default);
                resolve_references(&value, env)
            }
        };
        env.insert(var.key.clone(), value.clone());
        resolved.insert(var.key.clone(), value);
    }
}

/// 未解決トークンを注意事項に変換
pub(crate) fn unresolved_advisory(tmpl: &mut TemplateContext) -> Option<String> {
    let tokens: Vec<String> = tmpl.take_unresolved().into_iter().collect();
    (!tokens.is_empty()).then(|| EngineError::TemplateUnresolved(tokens).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, domain: &str, port: u16, is_main: bool) -> ContainerConfig {
        ContainerConfig {
            name: name.to_string(),
            container_id: String::new(),
            image: "n8nio/n8n:1.0".to_string(),
            domain: domain.to_string(),
            port,
            command: "n8n worker".to_string(),
            env: BTreeMap::from([("A".to_string(), "1".to_string())]),
            volumes: vec!["n8n_data:/home/node".to_string()],
            is_main,
        }
    }

    #[test]
    fn test_runtime_names() {
        let member = ContainerPlan::new("n8n", true, record("worker", "", 0, false));
        assert_eq!(member.runtime_name, "n8n-worker");

        let single = ContainerPlan::new("uptime", false, record("uptime", "up.example.com", 3001, true));
        assert_eq!(single.runtime_name, "uptime");
    }

    #[test]
    fn test_spec_with_routing() {
        let plan = ContainerPlan::new("n8n", true, record("editor", "n8n.example.com", 5678, true));
        let spec = plan.container_spec("hostfy_network");

        assert_eq!(spec.name, "n8n-editor");
        assert_eq!(spec.network, "hostfy_network");
        assert_eq!(spec.restart, RestartPolicy::Always);
        assert_eq!(spec.command, vec!["n8n", "worker"]);
        assert_eq!(
            spec.labels.get("traefik.http.routers.n8n_editor.rule").unwrap(),
            "Host(`n8n.example.com`)"
        );
    }

    #[test]
    fn test_spec_without_domain_is_only_managed() {
        let plan = ContainerPlan::new("n8n", true, record("worker", "", 5678, false));
        let spec = plan.container_spec("hostfy_network");
        assert!(!spec.labels.contains_key("traefik.enable"));
        assert_eq!(spec.labels.get("hostfy.app").unwrap(), "n8n-worker");
    }

    #[test]
    fn test_user_env_respects_overrides() {
        let mut tmpl = TemplateContext::new("chat", "chat.example.com", "");
        let vars = vec![
            UserEnvVar {
                key: "ADMIN_EMAIL".to_string(),
                prompt: String::new(),
                default: "admin@{{APP_DOMAIN}}".to_string(),
            },
            UserEnvVar {
                key: "ADMIN_PASSWORD".to_string(),
                prompt: String::new(),
                default: "{{GENERATE_SECRET_16}}".to_string(),
            },
        ];
        let overrides = BTreeMap::from([("ADMIN_PASSWORD".to_string(), "hunter2".to_string())]);
        let mut env = BTreeMap::new();
        let mut resolved = BTreeMap::new();

        apply_user_env(&mut tmpl, &vars, &overrides, &mut env, &mut resolved);

        assert_eq!(env.get("ADMIN_EMAIL").unwrap(), "admin@chat.example.com");
        assert_eq!(env.get("ADMIN_PASSWORD").unwrap(), "hunter2");
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_user_env_uses_preserved_value() {
        let mut tmpl = TemplateContext::new("chat", "chat.example.com", "");
        tmpl.preserve([("ADMIN_PASSWORD".to_string(), "kept".to_string())]);
        let vars = vec![UserEnvVar {
            key: "ADMIN_PASSWORD".to_string(),
            prompt: String::new(),
            default: "{{GENERATE_SECRET_16}}".to_string(),
        }];
        let mut env = BTreeMap::new();
        let mut resolved = BTreeMap::new();

        apply_user_env(&mut tmpl, &vars, &BTreeMap::new(), &mut env, &mut resolved);
        assert_eq!(env.get("ADMIN_PASSWORD").unwrap(), "kept");
    }
}
