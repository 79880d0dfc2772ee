//! インストール済みアプリの起動・停止・再起動とログ
//!
//! スタックは全メンバーコンテナが対象。`all` は共有サービスも含む。

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::orchestrator::load_record;
use crate::services::ensure_service;
use hostfy_container::LogStream;
use hostfy_core::AppConfig;
use hostfy_core::naming::{POSTGRES_SERVICE, PROXY_SERVICE, REDIS_SERVICE};
use serde::Serialize;
use std::fmt;
use tracing::{info, instrument, warn};

/// 操作対象
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 共有サービスとすべてのアプリ
    All,
    App(String),
}

impl Target {
    pub fn parse(value: &str) -> Self {
        if value == "all" {
            Target::All
        } else {
            Target::App(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Restart => "restart",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LifecycleReport {
    /// 操作に成功したコンテナ名
    pub containers: Vec<String>,
    pub advisories: Vec<String>,
}

/// 起動・停止・再起動
///
/// 単一アプリ指定では最初の失敗で止まる。`all` では失敗を注意事項として集めて続行する。
/// `all` の停止は共有サービスを止めない。
#[instrument(skip(ctx))]
pub async fn run(ctx: &EngineContext, action: LifecycleAction, target: Target) -> Result<LifecycleReport> {
    let mut report = LifecycleReport::default();

    match target {
        Target::App(name) => {
            let record = load_record(ctx, &name)?;
            for container in record.runtime_names() {
                apply(ctx, action, &container).await?;
                report.containers.push(container);
            }
        }
        Target::All => {
            if action != LifecycleAction::Stop {
                ensure_shared_services(ctx, &mut report).await;
            }
            for record in ctx.store.list_apps()? {
                apply_all_members(ctx, action, &record, &mut report).await;
            }
        }
    }

    info!(action = %action, containers = report.containers.len(), "Lifecycle finished");
    Ok(report)
}

async fn ensure_shared_services(ctx: &EngineContext, report: &mut LifecycleReport) {
    let secrets = match ctx.store.ensure_secrets() {
        Ok(secrets) => secrets,
        Err(e) => {
            warn!(error = %e, "Secrets unavailable, skipping shared services");
            report.advisories.push(e.to_string());
            return;
        }
    };
    let catalog = ctx.catalog.cached();
    for kind in [PROXY_SERVICE, POSTGRES_SERVICE, REDIS_SERVICE] {
        match ensure_service(ctx, catalog.as_ref(), kind, &secrets).await {
            Ok(outcome) => info!(service = %kind, outcome = ?outcome, "Service ready"),
            Err(e) => {
                warn!(service = %kind, error = %e, "Service failed to start");
                report.advisories.push(e.to_string());
            }
        }
    }
}

async fn apply_all_members(
    ctx: &EngineContext,
    action: LifecycleAction,
    record: &AppConfig,
    report: &mut LifecycleReport,
) {
    for container in record.runtime_names() {
        match apply(ctx, action, &container).await {
            Ok(()) => report.containers.push(container),
            Err(e) => {
                warn!(container = %container, error = %e, "Lifecycle action failed");
                report.advisories.push(e.to_string());
            }
        }
    }
}

async fn apply(ctx: &EngineContext, action: LifecycleAction, container: &str) -> Result<()> {
    let runtime = ctx.runtime.as_ref();
    let result = match action {
        LifecycleAction::Start => runtime.start_container(container).await,
        LifecycleAction::Stop => runtime.stop_container(container).await,
        LifecycleAction::Restart => runtime.restart_container(container).await,
    };
    result.map_err(EngineError::container(container))
}

/// ログ対象のコンテナ名を決める
///
/// 指定がなければメインコンテナ。スタックに存在しない名前なら UnknownContainer。
pub fn resolve_log_target(record: &AppConfig, container: Option<&str>) -> Result<String> {
    match container {
        None => Ok(record
            .main_container()
            .map(|c| record.runtime_name(c))
            .unwrap_or_else(|| record.name.clone())),
        Some(name) => record
            .find_container(name)
            .map(|c| record.runtime_name(c))
            .ok_or_else(|| EngineError::UnknownContainer {
                app: record.name.clone(),
                container: name.to_string(),
                available: record.containers.iter().map(|c| c.name.clone()).collect(),
            }),
    }
}

/// ログのストリームを開く
pub async fn logs(
    ctx: &EngineContext,
    name: &str,
    container: Option<&str>,
    tail: usize,
    follow: bool,
) -> Result<LogStream> {
    let record = load_record(ctx, name)?;
    let target = resolve_log_target(&record, container)?;
    ctx.runtime
        .logs(&target, tail, follow)
        .await
        .map_err(EngineError::container(&target))
}
