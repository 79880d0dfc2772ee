//! 共有サービス（PostgreSQL・Redis・Traefik）のライフサイクル
//!
//! 各サービスはホストに1つだけ存在し、複数のアプリから共有される。
//! `ensure_running` は何度呼んでも安全で、必要な場合のみ作成・起動する。

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use hostfy_container::{
    ContainerRuntime, ContainerSpec, HealthcheckSpec, PortMapping, RestartPolicy,
};
use hostfy_core::labels::service_labels;
use hostfy_core::naming::{
    DATABASE_USER, POSTGRES_SERVICE, PROXY_SERVICE, REDIS_SERVICE, service_container_name,
};
use hostfy_core::{Catalog, Service, SystemSecrets, TemplateContext};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// ensure_running の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    AlreadyRunning,
    Started,
    Created,
}

/// 共有サービスの固定構成
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    pub kind: String,
    pub container_name: String,
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub volumes: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub command: Vec<String>,
    pub restart: RestartPolicy,
    pub healthcheck: Option<HealthcheckSpec>,
    /// `None` なら healthy 待ちをしない
    pub health_timeout: Option<Duration>,
}

impl ServiceDefinition {
    fn base(kind: &str, image: &str) -> Self {
        Self {
            kind: kind.to_string(),
            container_name: service_container_name(kind),
            image: image.to_string(),
            env: BTreeMap::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
            command: Vec::new(),
            restart: RestartPolicy::Always,
            healthcheck: None,
            health_timeout: None,
        }
    }

    pub fn postgres(secrets: &SystemSecrets) -> Self {
        let mut def = Self::base(POSTGRES_SERVICE, "postgres:15-alpine");
        def.env = BTreeMap::from([
            ("POSTGRES_USER".to_string(), DATABASE_USER.to_string()),
            (
                "POSTGRES_PASSWORD".to_string(),
                secrets.postgres_password.clone(),
            ),
            ("POSTGRES_DB".to_string(), DATABASE_USER.to_string()),
        ]);
        def.volumes = vec!["hostfy_postgres_data:/var/lib/postgresql/data".to_string()];
        def.ports = vec![PortMapping::same(5432)];
        def.healthcheck = Some(HealthcheckSpec {
            test: vec![
                "CMD-SHELL".to_string(),
                format!("pg_isready -U {}", DATABASE_USER),
            ],
            interval: Duration::from_secs(5),
            retries: 5,
        });
        def.health_timeout = Some(Duration::from_secs(60));
        def
    }

    pub fn redis(secrets: &SystemSecrets) -> Self {
        let mut def = Self::base(REDIS_SERVICE, "redis:7-alpine");
        def.volumes = vec!["hostfy_redis_data:/data".to_string()];
        def.ports = vec![PortMapping::same(6379)];
        def.command = ["redis-server", "--appendonly", "yes"]
            .into_iter()
            .map(String::from)
            .collect();
        if let Some(password) = &secrets.redis_password {
            def.command.extend(["--requirepass".to_string(), password.clone()]);
        }
        def.healthcheck = Some(HealthcheckSpec {
            test: vec!["CMD".to_string(), "redis-cli".to_string(), "ping".to_string()],
            interval: Duration::from_secs(5),
            retries: 5,
        });
        def.health_timeout = Some(Duration::from_secs(30));
        def
    }

    /// リバースプロキシ。Dockerプロバイダは共有ネットワークのみを監視する
    pub fn proxy(network: &str, dashboard: bool) -> Self {
        let mut def = Self::base(PROXY_SERVICE, "traefik:v3.2");
        def.env = BTreeMap::from([("DOCKER_API_VERSION".to_string(), "1.44".to_string())]);
        def.volumes = vec![
            "/var/run/docker.sock:/var/run/docker.sock:ro".to_string(),
            "hostfy_traefik_certs:/letsencrypt".to_string(),
        ];
        def.ports = vec![PortMapping::same(80), PortMapping::same(443)];

        let resolver = hostfy_core::labels::CERT_RESOLVER;
        def.command = vec![
            "--providers.docker=true".to_string(),
            "--providers.docker.exposedbydefault=false".to_string(),
            format!("--providers.docker.network={}", network),
            "--entrypoints.web.address=:80".to_string(),
            "--entrypoints.websecure.address=:443".to_string(),
            "--entrypoints.web.http.redirections.entryPoint.to=websecure".to_string(),
            "--entrypoints.web.http.redirections.entryPoint.scheme=https".to_string(),
            format!("--certificatesresolvers.{}.acme.httpchallenge=true", resolver),
            format!(
                "--certificatesresolvers.{}.acme.httpchallenge.entrypoint=web",
                resolver
            ),
            format!(
                "--certificatesresolvers.{}.acme.storage=/letsencrypt/acme.json",
                resolver
            ),
        ];
        if dashboard {
            def.command.push("--api.insecure=true".to_string());
            def.ports.push(PortMapping::same(8080));
        }
        def
    }

    /// サービス名から構成を決定
    ///
    /// 組み込み定義があればそれを基にし、カタログの同名エントリで上書きする。
    /// 組み込み定義のないサービスはカタログのエントリだけで構成する。
    pub fn resolve(
        kind: &str,
        catalog: Option<&Catalog>,
        secrets: &SystemSecrets,
        network: &str,
        dashboard: bool,
    ) -> Result<Self> {
        let entry = catalog.and_then(|c| c.services.get(kind));
        let builtin = match kind {
            POSTGRES_SERVICE => Some(Self::postgres(secrets)),
            REDIS_SERVICE => Some(Self::redis(secrets)),
            PROXY_SERVICE => Some(Self::proxy(network, dashboard)),
            _ => None,
        };

        match (builtin, entry) {
            (Some(mut def), Some(service)) => {
                def.apply_catalog(service, secrets);
                Ok(def)
            }
            (Some(def), None) => Ok(def),
            (None, Some(service)) => {
                let mut def = Self::base(kind, &service.image);
                def.health_timeout = Some(Duration::from_secs(60));
                def.apply_catalog(service, secrets);
                Ok(def)
            }
            (None, None) => Err(EngineError::CatalogEntryNotFound(kind.to_string())),
        }
    }

    fn apply_catalog(&mut self, service: &Service, secrets: &SystemSecrets) {
        if !service.image.is_empty() {
            self.image = service.image.clone();
        }
        if let Some(command) = &service.command {
            self.command = command.split_whitespace().map(String::from).collect();
        }
        if let Some(restart) = &service.restart {
            self.restart = RestartPolicy::parse(restart);
        }
        if !service.env.is_empty() {
            let mut ctx = TemplateContext::new(&self.kind, "", "").with_secrets(secrets.clone());
            self.env.extend(ctx.resolve_env(&service.env));
        }
        if !service.volumes.is_empty() {
            self.volumes = service.volumes.clone();
        }
        if !service.ports.is_empty() {
            self.ports = service
                .ports
                .iter()
                .filter_map(|p| {
                    let mapping = PortMapping::parse(p);
                    if mapping.is_none() {
                        warn!(service = %self.kind, port = %p, "Ignoring invalid port");
                    }
                    mapping
                })
                .collect();
        }
        if let Some(hc) = &service.healthcheck
            && !hc.test.is_empty()
        {
            self.healthcheck = Some(HealthcheckSpec {
                test: hc.test.clone(),
                interval: parse_interval(&hc.interval).unwrap_or(Duration::from_secs(5)),
                retries: if hc.retries > 0 { hc.retries } else { 3 },
            });
        }
    }

    pub fn container_spec(&self, network: &str) -> ContainerSpec {
        ContainerSpec {
            name: self.container_name.clone(),
            image: self.image.clone(),
            env: self.env.clone(),
            volumes: self.volumes.clone(),
            ports: self.ports.clone(),
            labels: service_labels(&self.kind),
            command: self.command.clone(),
            restart: self.restart,
            network: network.to_string(),
            healthcheck: self.healthcheck.clone(),
        }
    }
}

/// "5s"・"500ms"・"1m"・"30"（秒）を解析
pub fn parse_interval(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => value.split_at(i),
        None => (value, "s"),
    };
    let n: u64 = number.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(n)),
        "s" => Some(Duration::from_secs(n)),
        "m" => Some(Duration::from_secs(n * 60)),
        "h" => Some(Duration::from_secs(n * 3600)),
        _ => None,
    }
}

/// サービスが起動していることを保証する
///
/// 起動中なら何もしない。停止中なら起動して healthy を待つ。存在しなければ
/// イメージを取得して作成・起動し、healthy を待つ。
pub async fn ensure_running(
    runtime: &dyn ContainerRuntime,
    def: &ServiceDefinition,
    network: &str,
) -> Result<EnsureOutcome> {
    let failed = |source| EngineError::DependencyStartFailed {
        service: def.kind.clone(),
        source,
    };
    let name = &def.container_name;

    let outcome = match runtime.inspect_container(name).await.map_err(failed)? {
        Some(info) if info.state == hostfy_container::ContainerState::Running => {
            debug!(service = %def.kind, "Service already running");
            return Ok(EnsureOutcome::AlreadyRunning);
        }
        Some(_) => {
            info!(service = %def.kind, "Starting stopped service");
            runtime.start_container(name).await.map_err(failed)?;
            EnsureOutcome::Started
        }
        None => {
            info!(service = %def.kind, image = %def.image, "Creating service");
            runtime.pull_image(&def.image).await.map_err(failed)?;
            runtime
                .create_container(&def.container_spec(network))
                .await
                .map_err(failed)?;
            runtime.start_container(name).await.map_err(failed)?;
            EnsureOutcome::Created
        }
    };

    if let Some(timeout) = def.health_timeout {
        runtime.wait_healthy(name, timeout).await.map_err(failed)?;
    }
    Ok(outcome)
}

/// カタログ（キャッシュ）と設定から構成を解決して起動する
pub async fn ensure_service(
    ctx: &EngineContext,
    catalog: Option<&Catalog>,
    kind: &str,
    secrets: &SystemSecrets,
) -> Result<EnsureOutcome> {
    let def = ServiceDefinition::resolve(
        kind,
        catalog,
        secrets,
        &ctx.settings.network,
        ctx.settings.proxy_dashboard,
    )?;
    ensure_running(ctx.runtime.as_ref(), &def, &ctx.settings.network).await
}

/// 共有サービスのコンテナ名（照合処理で「孤立」扱いしない）
pub fn reserved_container_names(catalog: Option<&Catalog>) -> Vec<String> {
    let mut names: Vec<String> = [PROXY_SERVICE, POSTGRES_SERVICE, REDIS_SERVICE]
        .into_iter()
        .map(service_container_name)
        .collect();
    if let Some(catalog) = catalog {
        names.extend(catalog.services.keys().map(|k| service_container_name(k)));
    }
    names.sort();
    names.dedup();
    names
}

/// 共有PostgreSQLに対するデータベース操作
pub struct PostgresManager<'a> {
    runtime: &'a dyn ContainerRuntime,
    container: String,
}

impl<'a> PostgresManager<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime) -> Self {
        Self {
            runtime,
            container: service_container_name(POSTGRES_SERVICE),
        }
    }

    pub async fn is_running(&self) -> Result<bool> {
        Ok(self.runtime.container_running(&self.container).await?)
    }

    /// データベースを作成（既に存在する場合も成功）
    pub async fn create_database(&self, name: &str) -> Result<()> {
        let sql = format!("CREATE DATABASE {};", quote_identifier(name)?);
        match self.psql(name, &sql, false).await {
            Ok(_) => {
                info!(database = %name, "Created database");
                Ok(())
            }
            Err(EngineError::DatabaseOperationFailed { message, .. })
                if message.contains("already exists") =>
            {
                debug!(database = %name, "Database already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn drop_database(&self, name: &str) -> Result<()> {
        let sql = format!("DROP DATABASE IF EXISTS {};", quote_identifier(name)?);
        self.psql(name, &sql, false).await?;
        info!(database = %name, "Dropped database");
        Ok(())
    }

    /// 管理用（template・hostfy・postgres）を除いたデータベース一覧
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT datname FROM pg_database WHERE datistemplate = false AND datname != '{}' AND datname != 'postgres';",
            DATABASE_USER
        );
        let output = self.psql("pg_database", &sql, true).await?;
        let mut databases: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        databases.sort();
        Ok(databases)
    }

    async fn psql(&self, database: &str, sql: &str, tuples_only: bool) -> Result<String> {
        let mut cmd = vec!["psql".to_string(), "-U".to_string(), DATABASE_USER.to_string()];
        if tuples_only {
            cmd.push("-t".to_string());
        }
        cmd.extend(["-c".to_string(), sql.to_string()]);

        let failed = |message: String| EngineError::DatabaseOperationFailed {
            database: database.to_string(),
            message,
        };
        let output = self
            .runtime
            .exec(&self.container, &cmd)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !output.success() {
            return Err(failed(output.output.trim().to_string()));
        }
        Ok(output.output)
    }
}

/// SQL識別子として引用符で囲む。`"` を含む名前は拒否する
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('"') || name.contains('\0') {
        return Err(EngineError::InvalidName(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}
