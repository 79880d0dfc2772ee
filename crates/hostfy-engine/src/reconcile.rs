//! 記録とランタイムの照合
//!
//! 記録にない管理対象コンテナと、どのアプリも使っていないデータベースを検出する。

use crate::cleanup::{CleanupAction, CleanupReport, CleanupStep, run_actions};
use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::services::{PostgresManager, reserved_container_names};
use hostfy_core::AppConfig;
use hostfy_core::labels::MANAGED_LABEL;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    pub containers: Vec<String>,
    pub databases: Vec<String>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.databases.is_empty()
    }
}

/// 管理ラベル付きコンテナのうち、どの記録にも属さず共有サービスでもないもの
pub fn compute_orphans(apps: &[AppConfig], managed: &[String], reserved: &[String]) -> Vec<String> {
    let expected: BTreeSet<String> = apps.iter().flat_map(AppConfig::runtime_names).collect();
    let reserved: BTreeSet<&str> = reserved.iter().map(String::as_str).collect();

    let orphans: BTreeSet<String> = managed
        .iter()
        .map(|name| name.trim_start_matches('/').to_string())
        .filter(|name| !expected.contains(name) && !reserved.contains(name.as_str()))
        .collect();
    orphans.into_iter().collect()
}

/// どの記録の `database` にも一致しないデータベース
pub fn compute_orphan_databases(apps: &[AppConfig], databases: &[String]) -> Vec<String> {
    let tracked: BTreeSet<&str> = apps
        .iter()
        .map(|app| app.database.as_str())
        .filter(|db| !db.is_empty())
        .collect();
    let orphans: BTreeSet<String> = databases
        .iter()
        .filter(|db| !tracked.contains(db.as_str()))
        .cloned()
        .collect();
    orphans.into_iter().collect()
}

#[instrument(skip(ctx))]
pub async fn find_orphans(ctx: &EngineContext) -> Result<OrphanReport> {
    let apps = ctx.store.list_apps()?;
    let managed = ctx
        .runtime
        .list_by_label(MANAGED_LABEL, "true")
        .await
        .map_err(EngineError::container(MANAGED_LABEL))?;
    let reserved = reserved_container_names(ctx.catalog.cached().as_ref());

    let mut report = OrphanReport {
        containers: compute_orphans(&apps, &managed, &reserved),
        databases: Vec::new(),
    };

    let postgres = PostgresManager::new(ctx.runtime.as_ref());
    if postgres.is_running().await? {
        let databases = postgres.list_databases().await?;
        report.databases = compute_orphan_databases(&apps, &databases);
    }

    info!(
        containers = report.containers.len(),
        databases = report.databases.len(),
        "Orphan scan finished"
    );
    Ok(report)
}

/// 孤立リソースを削除する（`confirmed` でなければ何もしない）
#[instrument(skip(ctx, report))]
pub async fn cleanup(
    ctx: &EngineContext,
    report: &OrphanReport,
    confirmed: bool,
) -> Result<CleanupReport> {
    if !confirmed {
        return Ok(CleanupReport::default());
    }

    let actions = report
        .containers
        .iter()
        .map(|name| CleanupAction::advisory(CleanupStep::RemoveContainer(name.clone())))
        .chain(
            report
                .databases
                .iter()
                .map(|db| CleanupAction::advisory(CleanupStep::DropDatabase(db.clone()))),
        )
        .collect();

    run_actions(ctx, actions).await
}
