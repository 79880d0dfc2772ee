use super::{ContainerPlan, apply_user_env, launch, unresolved_advisory};
use crate::catalog::find_app;
use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::services::{PostgresManager, ensure_service};
use hostfy_core::naming::{
    POSTGRES_SERVICE, database_name, is_reserved_name, validate_app_name,
};
use hostfy_core::{AppConfig, ContainerConfig, TemplateContext};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    /// カタログ上のアプリID
    pub app_id: String,
    /// スタック名（省略時はアプリID）
    pub name: Option<String>,
    pub domain: String,
    /// `--env KEY=VALUE`
    pub env_overrides: BTreeMap<String, String>,
}

impl InstallRequest {
    pub fn stack_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.app_id)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub name: String,
    pub catalog_app: String,
    /// 作成したコンテナ名（宣言順）
    pub containers: Vec<String>,
    /// ルーティングを設定したドメイン（DNSの設定が必要）
    pub domains: Vec<String>,
    pub database: Option<String>,
    /// UserEnvVar の解決結果（初期ログイン情報など）
    pub credentials: BTreeMap<String, String>,
    /// 以前のインストールのシークレットを再利用したか
    pub reused_secrets: bool,
    pub advisories: Vec<String>,
}

/// アプリをインストール
///
/// 途中で失敗しても作成済みのコンテナは残る（ロールバックしない）。
/// 記録はすべてのコンテナが起動した後にのみ保存する。
#[instrument(skip(ctx, request), fields(app = %request.app_id))]
pub async fn install(ctx: &EngineContext, request: InstallRequest) -> Result<InstallReport> {
    let name = request.stack_name().to_string();
    validate_app_name(&name).map_err(|_| EngineError::InvalidName(name.clone()))?;
    if is_reserved_name(&name) {
        return Err(EngineError::ReservedName(name));
    }
    if ctx.store.app_exists(&name) {
        return Err(EngineError::AlreadyInstalled(name));
    }

    let catalog = ctx.catalog.fetch(false).await?;
    let app = find_app(&catalog, &request.app_id)?;
    let secrets = ctx.store.ensure_secrets()?;

    ctx.runtime
        .ensure_network(&ctx.settings.network)
        .await
        .map_err(EngineError::container(&ctx.settings.network))?;

    for dependency in &app.dependencies {
        let outcome = ensure_service(ctx, Some(&catalog), dependency, &secrets).await?;
        info!(service = %dependency, outcome = ?outcome, "Dependency ready");
    }

    let database = if app.dependencies.iter().any(|d| d == POSTGRES_SERVICE) {
        let database = database_name(&name);
        PostgresManager::new(ctx.runtime.as_ref())
            .create_database(&database)
            .await?;
        Some(database)
    } else {
        None
    };

    let mut tmpl = TemplateContext::new(
        &name,
        &request.domain,
        database.clone().unwrap_or_default(),
    )
    .with_secrets(secrets);

    let mut reused_secrets = false;
    if let Some(backup) = ctx.store.load_backup(&name)?
        && backup.catalog_app == request.app_id
    {
        info!(app = %name, keys = backup.secrets.len(), "Reusing secrets from previous install");
        tmpl.preserve(backup.secrets);
        reused_secrets = true;
    }

    let mut credentials = BTreeMap::new();
    let mut stack_env = tmpl.resolve_env(app.stack_env());
    stack_env.extend(request.env_overrides.clone());
    apply_user_env(
        &mut tmpl,
        &app.user_env,
        &request.env_overrides,
        &mut stack_env,
        &mut credentials,
    );

    let mut record = AppConfig::new(&name, &request.app_id, &request.domain);
    record.is_stack = app.is_stack();
    record.database = database.clone().unwrap_or_default();
    if record.is_stack {
        record.shared_env = stack_env.clone();
    }

    let mut report = InstallReport {
        name: name.clone(),
        catalog_app: request.app_id.clone(),
        database,
        reused_secrets,
        ..Default::default()
    };

    for template in app.container_templates() {
        let domain = match (template.is_main, template.route) {
            (true, _) => request.domain.clone(),
            (false, Some(route)) => tmpl.resolve_value_with(&route.subdomain, &stack_env),
            (false, None) => String::new(),
        };
        let port = match template.port {
            0 => template.route.map(|r| r.port).unwrap_or(0),
            port => port,
        };

        let mut env = stack_env.clone();
        if let Some(container_env) = template.env {
            env.extend(tmpl.resolve_env_in_scope(container_env, &stack_env));
            env.extend(request.env_overrides.clone());
        }
        apply_user_env(
            &mut tmpl,
            template.user_env,
            &request.env_overrides,
            &mut env,
            &mut credentials,
        );

        let plan = ContainerPlan::new(
            &name,
            record.is_stack,
            ContainerConfig {
                name: template.name.unwrap_or(name.as_str()).to_string(),
                container_id: String::new(),
                image: template.image.to_string(),
                domain,
                port,
                command: template.command.to_string(),
                env,
                volumes: tmpl.resolve_volumes(template.volumes),
                is_main: template.is_main,
            },
        );

        ctx.runtime
            .pull_image(&plan.record.image)
            .await
            .map_err(EngineError::container(&plan.runtime_name))?;
        let container_id = launch(ctx, &plan).await?;
        info!(container = %plan.runtime_name, "Container running");

        if !plan.record.domain.is_empty() && plan.record.port > 0 {
            report.domains.push(plan.record.domain.clone());
        }
        report.containers.push(plan.runtime_name.clone());

        let mut container = plan.record;
        container.container_id = container_id;
        record.containers.push(container);
    }

    record.sync_legacy_fields();
    ctx.store
        .save_app(&mut record)
        .map_err(EngineError::write_failed(&name))?;

    report.credentials = credentials;
    report.advisories.extend(unresolved_advisory(&mut tmpl));
    info!(app = %name, containers = report.containers.len(), "Installed");
    Ok(report)
}
