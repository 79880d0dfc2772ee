use super::load_record;
use crate::cleanup::{CleanupAction, CleanupStep, run_actions};
use crate::context::EngineContext;
use crate::error::Result;
use hostfy_core::AppConfig;
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default)]
pub struct RemoveRequest {
    pub name: String,
    /// データベース・ボリューム・バックアップも削除する
    pub purge: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoveReport {
    pub name: String,
    pub purged: bool,
    pub removed_containers: Vec<String>,
    pub removed_volumes: Vec<String>,
    pub dropped_database: Option<String>,
    /// シークレットのバックアップを残したか
    pub secrets_backed_up: bool,
    pub advisories: Vec<String>,
}

/// アプリを削除
///
/// 既定ではデータを残し、機密値をバックアップする。記録の削除は常に最後に行う。
#[instrument(skip(ctx, request), fields(app = %request.name, purge = request.purge))]
pub async fn remove(ctx: &EngineContext, request: RemoveRequest) -> Result<RemoveReport> {
    let record = load_record(ctx, &request.name)?;
    let actions = plan_removal(&record, request.purge);

    let cleanup = run_actions(ctx, actions).await?;

    let mut report = RemoveReport {
        name: record.name.clone(),
        purged: request.purge,
        removed_volumes: cleanup.removed_volumes,
        secrets_backed_up: cleanup.secrets_backed_up,
        advisories: cleanup.advisories,
        ..Default::default()
    };
    for step in cleanup.completed {
        match step {
            CleanupStep::RemoveContainer(name) => report.removed_containers.push(name),
            CleanupStep::DropDatabase(database) => report.dropped_database = Some(database),
            _ => {}
        }
    }

    info!(app = %record.name, advisories = report.advisories.len(), "Removed");
    Ok(report)
}

/// 削除処理の列。記録の削除だけが Fatal
pub fn plan_removal(record: &AppConfig, purge: bool) -> Vec<CleanupAction> {
    let mut actions: Vec<CleanupAction> = record
        .runtime_names()
        .into_iter()
        .map(|name| CleanupAction::advisory(CleanupStep::RemoveContainer(name)))
        .collect();

    if purge {
        if !record.database.is_empty() {
            actions.push(CleanupAction::advisory(CleanupStep::DropDatabase(
                record.database.clone(),
            )));
        }
        let volumes = record.named_volumes();
        if !volumes.is_empty() {
            actions.push(CleanupAction::advisory(CleanupStep::RemoveVolumes(volumes)));
        }
        actions.push(CleanupAction::advisory(CleanupStep::DeleteBackup(
            record.name.clone(),
        )));
    } else {
        actions.push(CleanupAction::advisory(CleanupStep::BackupSecrets(
            record.name.clone(),
        )));
    }

    actions.push(CleanupAction::fatal(CleanupStep::DeleteRecord(
        record.name.clone(),
    )));
    actions
}
