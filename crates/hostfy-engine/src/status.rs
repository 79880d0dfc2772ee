//! システム全体の状態とデータベース管理
use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::services::{PostgresManager, ServiceDefinition};
use hostfy_container::ContainerState;
use hostfy_core::naming::{POSTGRES_SERVICE, PROXY_SERVICE, REDIS_SERVICE};
use hostfy_core::{AppConfig, StateStore, SystemSecrets};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
    Missing,
}

impl RunState {
    fn from_state(state: Option<ContainerState>) -> Self {
        match state {
            Some(ContainerState::Running) => RunState::Running,
            Some(_) => RunState::Stopped,
            None => RunState::Missing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Stopped => "stopped",
            RunState::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub status: RunState,
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerStatus {
    pub name: String,
    pub status: RunState,
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppStatus {
    pub name: String,
    pub catalog_app: String,
    pub domain: String,
    /// メインコンテナの状態
    pub status: RunState,
    pub containers: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub hostfy_version: String,
    pub os: String,
    pub arch: String,
    pub services: BTreeMap<String, ServiceStatus>,
    pub apps: Vec<AppStatus>,
}

/// 共有サービスとアプリの状態を集める
#[instrument(skip(ctx))]
pub async fn system_status(ctx: &EngineContext) -> Result<SystemStatus> {
    let secrets = ctx.store.load_secrets().unwrap_or_default();
    let catalog = ctx.catalog.cached();

    let mut services = BTreeMap::new();
    for kind in [PROXY_SERVICE, POSTGRES_SERVICE, REDIS_SERVICE] {
        let def = ServiceDefinition::resolve(
            kind,
            catalog.as_ref(),
            &secrets,
            &ctx.settings.network,
            ctx.settings.proxy_dashboard,
        )?;
        let status = container_state(ctx, &def.container_name).await?;
        let databases = if kind == POSTGRES_SERVICE && status == RunState::Running {
            PostgresManager::new(ctx.runtime.as_ref())
                .list_databases()
                .await
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        services.insert(
            kind.to_string(),
            ServiceStatus {
                status,
                image: def.image,
                databases,
            },
        );
    }

    let mut apps = Vec::new();
    for record in ctx.store.list_apps()? {
        apps.push(app_status(ctx, &record).await?);
    }

    Ok(SystemStatus {
        hostfy_version: env!("CARGO_PKG_VERSION").to_string(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        services,
        apps,
    })
}

/// アプリの各コンテナの状態
pub async fn app_status(ctx: &EngineContext, record: &AppConfig) -> Result<AppStatus> {
    let mut containers = Vec::new();
    let mut status = RunState::Missing;
    for container in &record.containers {
        let runtime_name = record.runtime_name(container);
        let state = container_state(ctx, &runtime_name).await?;
        if container.is_main || record.containers.len() == 1 {
            status = state;
        }
        containers.push(ContainerStatus {
            name: runtime_name,
            status: state,
            image: container.image.clone(),
        });
    }
    Ok(AppStatus {
        name: record.name.clone(),
        catalog_app: record.catalog_app.clone(),
        domain: record.domain.clone(),
        status,
        containers,
    })
}

async fn container_state(ctx: &EngineContext, name: &str) -> Result<RunState> {
    let info = ctx
        .runtime
        .inspect_container(name)
        .await
        .map_err(EngineError::container(name))?;
    Ok(RunState::from_state(info.map(|i| i.state)))
}

/// データベースと使用中のアプリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseEntry {
    pub name: String,
    /// `None` なら孤立
    pub app: Option<String>,
}

/// 共有PostgreSQLのデータベース一覧（名前順）
pub async fn list_databases(ctx: &EngineContext) -> Result<Vec<DatabaseEntry>> {
    let postgres = running_postgres(ctx).await?;
    let databases = postgres.list_databases().await?;
    let apps = ctx.store.list_apps()?;
    Ok(attach_owners(&apps, databases))
}

fn attach_owners(apps: &[AppConfig], databases: Vec<String>) -> Vec<DatabaseEntry> {
    databases
        .into_iter()
        .map(|name| DatabaseEntry {
            app: apps
                .iter()
                .find(|a| !a.database.is_empty() && a.database == name)
                .map(|a| a.name.clone()),
            name,
        })
        .collect()
}

/// 存在と使用状況を確認してから削除する
///
/// 記録されたアプリが使用中のデータベースは削除しない。
#[instrument(skip(ctx))]
pub async fn remove_database(ctx: &EngineContext, database: &str) -> Result<()> {
    let postgres = running_postgres(ctx).await?;
    if !postgres.list_databases().await?.iter().any(|d| d == database) {
        return Err(EngineError::DatabaseOperationFailed {
            database: database.to_string(),
            message: "データベースが存在しません".to_string(),
        });
    }
    if let Some(app) = ctx
        .store
        .list_apps()?
        .into_iter()
        .find(|a| a.database == database)
    {
        return Err(EngineError::DatabaseInUse {
            database: database.to_string(),
            app: app.name,
        });
    }

    postgres.drop_database(database).await?;
    info!(database = %database, "Removed database");
    Ok(())
}

async fn running_postgres(ctx: &EngineContext) -> Result<PostgresManager<'_>> {
    let postgres = PostgresManager::new(ctx.runtime.as_ref());
    if !postgres.is_running().await? {
        return Err(EngineError::DatabaseOperationFailed {
            database: POSTGRES_SERVICE.to_string(),
            message: "PostgreSQL が起動していません（hostfy start all で起動できます）".to_string(),
        });
    }
    Ok(postgres)
}

/// `secrets` コマンド用: アプリの環境変数とシステムシークレット
#[derive(Debug, Clone, Serialize)]
pub struct SecretsView {
    pub app: String,
    pub env: BTreeMap<String, String>,
    pub system: SystemSecrets,
}

/// 記録だけを読む（Docker接続は不要）
pub fn secrets_view(store: &StateStore, name: &str) -> Result<SecretsView> {
    let record = crate::orchestrator::read_record(store, name)?;
    let env: BTreeMap<String, String> = record
        .all_env()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok(SecretsView {
        app: record.name,
        env,
        system: store.load_secrets()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owners_are_attached() {
        let mut n8n = AppConfig::new("n8n", "n8n", "");
        n8n.database = "n8n_db".to_string();
        let uptime = AppConfig::new("uptime", "uptime", "");

        let entries = attach_owners(
            &[n8n, uptime],
            vec!["n8n_db".to_string(), "old_db".to_string()],
        );
        assert_eq!(entries[0].app.as_deref(), Some("n8n"));
        assert_eq!(entries[1].app, None);
    }

    #[test]
    fn test_secrets_view_merges_every_env() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let mut record = AppConfig::new("n8n", "n8n", "n8n.example.com");
        record.shared_env.insert("N8N_ENCRYPTION_KEY".to_string(), "abc".to_string());
        store.save_app(&mut record).unwrap();
        store.ensure_secrets().unwrap();

        let view = secrets_view(&store, "n8n").unwrap();
        assert_eq!(view.env["N8N_ENCRYPTION_KEY"], "abc");
        assert!(!view.system.postgres_password.is_empty());

        let err = secrets_view(&store, "ghost").unwrap_err();
        assert!(matches!(err, EngineError::StateRecordNotFound(_)));
    }

    #[test]
    fn test_run_state_serializes_lowercase() {
        let json = serde_json::to_string(&RunState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert_eq!(RunState::from_state(None), RunState::Missing);
        assert_eq!(
            RunState::from_state(Some(ContainerState::Paused)),
            RunState::Stopped
        );
    }
}
