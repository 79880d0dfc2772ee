//! ベストエフォートの後片付け
//!
//! 削除系の処理は [`CleanupAction`] の列として組み立て、すべてを実行する。
//! `Advisory` の失敗はレポートに集め、`Fatal` の失敗だけがエラーになる。

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::services::PostgresManager;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Fatal,
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CleanupStep {
    /// 停止して強制削除（存在しなければ成功扱い）
    RemoveContainer(String),
    BackupSecrets(String),
    DropDatabase(String),
    /// 記録に宣言された名前付きボリューム
    RemoveVolumes(Vec<String>),
    DeleteBackup(String),
    DeleteRecord(String),
}

impl CleanupStep {
    pub fn describe(&self) -> String {
        match self {
            CleanupStep::RemoveContainer(name) => format!("コンテナ {} を削除", name),
            CleanupStep::BackupSecrets(name) => format!("{} のシークレットをバックアップ", name),
            CleanupStep::DropDatabase(name) => format!("データベース {} を削除", name),
            CleanupStep::RemoveVolumes(names) => {
                format!("ボリューム {} を削除", names.join(", "))
            }
            CleanupStep::DeleteBackup(name) => format!("{} のバックアップを削除", name),
            CleanupStep::DeleteRecord(name) => format!("{} の記録を削除", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupAction {
    pub step: CleanupStep,
    pub severity: Severity,
}

impl CleanupAction {
    pub fn advisory(step: CleanupStep) -> Self {
        Self {
            step,
            severity: Severity::Advisory,
        }
    }

    pub fn fatal(step: CleanupStep) -> Self {
        Self {
            step,
            severity: Severity::Fatal,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub completed: Vec<CleanupStep>,
    /// 失敗した Advisory 処理（「説明: 理由」）
    pub advisories: Vec<String>,
    /// 削除したボリューム名
    pub removed_volumes: Vec<String>,
    /// シークレットのバックアップを書き出したか
    pub secrets_backed_up: bool,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.advisories.is_empty()
    }
}

/// すべての処理を順に実行する
///
/// Advisory の失敗では止まらない。Fatal の失敗はそれまでのレポートを捨ててエラーを返す。
pub async fn run_actions(ctx: &EngineContext, actions: Vec<CleanupAction>) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();

    for action in actions {
        match run_step(ctx, &action.step, &mut report).await {
            Ok(()) => {
                debug!(step = ?action.step, "Cleanup step done");
                report.completed.push(action.step);
            }
            Err(e) if action.severity == Severity::Advisory => {
                let description = action.step.describe();
                warn!(step = %description, error = %e, "Cleanup step failed");
                report.advisories.push(format!("{}: {}", description, first_line(&e)));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

async fn run_step(ctx: &EngineContext, step: &CleanupStep, report: &mut CleanupReport) -> Result<()> {
    let runtime = ctx.runtime.as_ref();
    match step {
        CleanupStep::RemoveContainer(name) => {
            match runtime.stop_container(name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(container = %name, "Container already gone");
                    return Ok(());
                }
                Err(e) => return Err(EngineError::container(name)(e)),
            }
            match runtime.remove_container(name, true).await {
                Ok(()) => {
                    info!(container = %name, "Removed container");
                    Ok(())
                }
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(EngineError::container(name)(e)),
            }
        }
        CleanupStep::BackupSecrets(name) => {
            let app = ctx.store.load_app(name)?;
            report.secrets_backed_up = ctx.store.backup_secrets(&app)?.is_some();
            Ok(())
        }
        CleanupStep::DropDatabase(database) => {
            PostgresManager::new(runtime).drop_database(database).await
        }
        CleanupStep::RemoveVolumes(names) => {
            let result = runtime
                .remove_volumes(names)
                .await
                .map_err(EngineError::container(names.join(", ")))?;
            if !result.removed.is_empty() {
                info!(count = result.removed.len(), "Removed volumes");
            }
            report.removed_volumes.extend(result.removed);
            // 個々の失敗は注意事項として残し、残りの処理は続ける
            for (volume, reason) in result.failed {
                warn!(volume = %volume, error = %reason, "Volume not removed");
                let reason = reason.lines().next().unwrap_or_default();
                report
                    .advisories
                    .push(format!("ボリューム {} を削除: {}", volume, reason));
            }
            Ok(())
        }
        CleanupStep::DeleteBackup(name) => Ok(ctx.store.delete_backup(name)?),
        CleanupStep::DeleteRecord(name) => ctx
            .store
            .delete_app(name)
            .map_err(EngineError::write_failed(name)),
    }
}

/// ヒント部分を除いた1行目
fn first_line(err: &EngineError) -> String {
    err.to_string().lines().next().unwrap_or_default().to_string()
}
