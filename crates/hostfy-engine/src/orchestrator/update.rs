use super::{ContainerPlan, load_record, recreate};
use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use hostfy_core::is_sensitive_key;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub name: String,
    pub domain: Option<String>,
    pub env_overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateReport {
    pub name: String,
    /// 適用した変更（空なら何もしていない）
    pub changes: Vec<String>,
    pub recreated: Vec<String>,
    /// ドメインを変更した場合の新しいドメイン（DNSの設定が必要）
    pub new_domain: Option<String>,
}

impl UpdateReport {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// 機密値はレポートに出さない
fn describe_override(key: &str, value: &str) -> String {
    if is_sensitive_key(key) {
        format!("{} = ********", key)
    } else {
        format!("{} = {}", key, value)
    }
}

/// 環境変数・ドメインを変更し、すべてのコンテナを作り直す
#[instrument(skip(ctx, request), fields(app = %request.name))]
pub async fn update(ctx: &EngineContext, request: UpdateRequest) -> Result<UpdateReport> {
    let mut record = load_record(ctx, &request.name)?;
    let mut report = UpdateReport {
        name: record.name.clone(),
        ..Default::default()
    };

    let new_domain = request
        .domain
        .as_deref()
        .filter(|d| !d.is_empty() && *d != record.domain)
        .map(String::from);
    if request.env_overrides.is_empty() && new_domain.is_none() {
        return Ok(report);
    }

    for (key, value) in &request.env_overrides {
        if record.is_stack {
            record.shared_env.insert(key.clone(), value.clone());
        } else {
            record.env.insert(key.clone(), value.clone());
        }
        for container in &mut record.containers {
            container.env.insert(key.clone(), value.clone());
        }
        report.changes.push(describe_override(key, value));
    }

    if let Some(new_domain) = new_domain {
        let old_domain = std::mem::replace(&mut record.domain, new_domain.clone());
        report
            .changes
            .push(format!("domain: {} → {}", old_domain, new_domain));

        if !old_domain.is_empty() {
            let rewrite = |env: &mut BTreeMap<String, String>| {
                for value in env.values_mut() {
                    if value.contains(&old_domain) {
                        *value = value.replace(&old_domain, &new_domain);
                    }
                }
            };
            rewrite(&mut record.env);
            rewrite(&mut record.shared_env);
            for container in &mut record.containers {
                rewrite(&mut container.env);
                if !container.is_main && container.domain.contains(&old_domain) {
                    container.domain = container.domain.replace(&old_domain, &new_domain);
                }
            }
        }

        let main_index = record
            .containers
            .iter()
            .position(|c| c.is_main)
            .unwrap_or(0);
        if let Some(main) = record.containers.get_mut(main_index) {
            main.domain = new_domain.clone();
        }
        report.new_domain = Some(new_domain);
    }

    ctx.runtime
        .ensure_network(&ctx.settings.network)
        .await
        .map_err(EngineError::container(&ctx.settings.network))?;

    for (i, plan) in ContainerPlan::from_app(&record).into_iter().enumerate() {
        let container_id = recreate(ctx, &plan).await?;
        info!(container = %plan.runtime_name, "Recreated container");
        record.containers[i].container_id = container_id;
        report.recreated.push(plan.runtime_name);
    }

    record.sync_legacy_fields();
    ctx.store
        .save_app(&mut record)
        .map_err(EngineError::write_failed(&record.name))?;

    info!(app = %record.name, changes = report.changes.len(), "Updated");
    Ok(report)
}
