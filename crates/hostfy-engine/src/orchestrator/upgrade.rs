use super::{ContainerPlan, load_record, recreate, unresolved_advisory};
use crate::catalog::find_app;
use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use chrono::Utc;
use hostfy_core::{AppConfig, AppShape, TemplateContext};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default)]
pub struct UpgradeRequest {
    pub name: String,
    /// イメージに差分がなくても全コンテナを作り直す
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageChange {
    pub container: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpgradeReport {
    pub name: String,
    pub up_to_date: bool,
    pub image_changes: Vec<ImageChange>,
    /// カタログから追加された環境変数キー
    pub added_env: Vec<String>,
    pub pulled: Vec<String>,
    pub recreated: Vec<String>,
    pub advisories: Vec<String>,
}

/// カタログの最新イメージに更新する
///
/// 既存の環境変数は上書きせず、カタログに新しく追加されたキーだけを取り込む。
#[instrument(skip(ctx, request), fields(app = %request.name))]
pub async fn upgrade(ctx: &EngineContext, request: UpgradeRequest) -> Result<UpgradeReport> {
    let mut record = load_record(ctx, &request.name)?;
    let catalog = ctx.catalog.fetch(true).await?;
    let app = find_app(&catalog, &record.catalog_app)?;

    let mut report = UpgradeReport {
        name: record.name.clone(),
        ..Default::default()
    };

    // 名前で対応するカタログ上のイメージと比較する
    let mut targets: Vec<usize> = Vec::new();
    for (i, container) in record.containers.iter().enumerate() {
        let catalog_image = if record.is_stack {
            app.image_for(&container.name)
        } else {
            Some(app.image.as_str())
        };
        match catalog_image {
            Some(image) if !image.is_empty() && image != container.image => {
                report.image_changes.push(ImageChange {
                    container: container.name.clone(),
                    from: container.image.clone(),
                    to: image.to_string(),
                });
                targets.push(i);
            }
            Some(_) => {}
            None => {
                warn!(container = %container.name, "Container no longer in catalog");
                report.advisories.push(format!(
                    "コンテナ '{}' はカタログに存在しないため更新しません",
                    container.name
                ));
            }
        }
    }

    let secrets = ctx.store.ensure_secrets()?;
    let mut tmpl = TemplateContext::new(&record.name, &record.domain, &record.database)
        .with_secrets(secrets);
    report.added_env = merge_new_env(&mut record, app.shape(), &mut tmpl);
    report.advisories.extend(unresolved_advisory(&mut tmpl));

    if targets.is_empty() && !request.force {
        if !report.added_env.is_empty() {
            record.sync_legacy_fields();
            ctx.store
                .save_app(&mut record)
                .map_err(EngineError::write_failed(&record.name))?;
        }
        report.up_to_date = true;
        info!(app = %record.name, "Already up to date");
        return Ok(report);
    }

    if request.force {
        targets = (0..record.containers.len()).collect();
    }

    ctx.runtime
        .ensure_network(&ctx.settings.network)
        .await
        .map_err(EngineError::container(&ctx.settings.network))?;

    for i in targets {
        if let Some(change) = report
            .image_changes
            .iter()
            .find(|c| c.container == record.containers[i].name)
        {
            record.containers[i].image = change.to.clone();
        }

        let plan = ContainerPlan::new(&record.name, record.is_stack, record.containers[i].clone());
        ctx.runtime
            .pull_image(&plan.record.image)
            .await
            .map_err(EngineError::container(&plan.runtime_name))?;
        report.pulled.push(plan.record.image.clone());

        record.containers[i].container_id = recreate(ctx, &plan).await?;
        if plan.is_main() {
            ctx.runtime
                .wait_healthy(&plan.runtime_name, ctx.settings.main_health_timeout)
                .await
                .map_err(EngineError::container(&plan.runtime_name))?;
        }
        info!(container = %plan.runtime_name, image = %plan.record.image, "Upgraded container");
        report.recreated.push(plan.runtime_name);
    }

    record.image_pulled_at = Utc::now();
    record.sync_legacy_fields();
    ctx.store
        .save_app(&mut record)
        .map_err(EngineError::write_failed(&record.name))?;

    Ok(report)
}

/// カタログに追加された環境変数を記録に取り込み、追加したキーを返す
fn merge_new_env(
    record: &mut AppConfig,
    shape: AppShape<'_>,
    tmpl: &mut TemplateContext,
) -> Vec<String> {
    let mut added = BTreeSet::new();

    // 既存の値は生成し直さない
    let existing: BTreeMap<String, String> = record
        .all_env()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    tmpl.preserve(existing);

    let (stack_env, containers) = match shape {
        AppShape::Single(app) => (&app.env, None),
        AppShape::Stack {
            containers,
            shared_env,
        } => (shared_env, Some(containers)),
    };

    let resolved_stack = tmpl.resolve_env(stack_env);
    let record_stack = if record.is_stack {
        &mut record.shared_env
    } else {
        &mut record.env
    };
    for (key, value) in &resolved_stack {
        if !record_stack.contains_key(key) {
            record_stack.insert(key.clone(), value.clone());
            added.insert(key.clone());
        }
    }
    for container in &mut record.containers {
        for (key, value) in &resolved_stack {
            if !container.env.contains_key(key) {
                container.env.insert(key.clone(), value.clone());
                added.insert(key.clone());
            }
        }
    }

    if let Some(catalog_containers) = containers {
        for container in &mut record.containers {
            let Some(entry) = catalog_containers.iter().find(|c| c.name == container.name) else {
                continue;
            };
            let resolved = tmpl.resolve_env_in_scope(&entry.env, &resolved_stack);
            for (key, value) in resolved {
                if !container.env.contains_key(&key) {
                    container.env.insert(key.clone(), value);
                    added.insert(key);
                }
            }
        }
    }

    added.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostfy_core::{App, ContainerConfig};

    fn single_record() -> AppConfig {
        let mut record = AppConfig::new("uptime", "uptime", "up.example.com");
        record.containers.push(ContainerConfig {
            name: "uptime".to_string(),
            container_id: "abc".to_string(),
            image: "louislam/uptime-kuma:1".to_string(),
            domain: "up.example.com".to_string(),
            port: 3001,
            command: String::new(),
            env: BTreeMap::from([("TZ".to_string(), "Asia/Tokyo".to_string())]),
            volumes: Vec::new(),
            is_main: true,
        });
        record.sync_legacy_fields();
        record
    }

    #[test]
    fn test_new_keys_are_added_without_overwriting() {
        let mut record = single_record();
        let app = App {
            image: "louislam/uptime-kuma:2".to_string(),
            env: BTreeMap::from([
                ("TZ".to_string(), "UTC".to_string()),
                ("UPTIME_KUMA_HOST".to_string(), "{{APP_DOMAIN}}".to_string()),
            ]),
            ..Default::default()
        };
        let mut tmpl = TemplateContext::new("uptime", "up.example.com", "");

        let added = merge_new_env(&mut record, app.shape(), &mut tmpl);

        assert_eq!(added, vec!["UPTIME_KUMA_HOST"]);
        assert_eq!(record.env.get("TZ").unwrap(), "Asia/Tokyo");
        assert_eq!(
            record.containers[0].env.get("UPTIME_KUMA_HOST").unwrap(),
            "up.example.com"
        );
    }

    #[test]
    fn test_nothing_added_when_catalog_env_unchanged() {
        let mut record = single_record();
        let app = App {
            env: BTreeMap::from([("TZ".to_string(), "UTC".to_string())]),
            ..Default::default()
        };
        let mut tmpl = TemplateContext::new("uptime", "up.example.com", "");
        assert!(merge_new_env(&mut record, app.shape(), &mut tmpl).is_empty());
    }
}
