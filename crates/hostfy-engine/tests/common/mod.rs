#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::StreamExt;
use hostfy_container::{
    ContainerError, ContainerInfo, ContainerRuntime, ContainerSpec, ContainerState, ExecOutput,
    HealthState, LogStream, VolumeRemoval,
};
use hostfy_core::{Catalog, StateStore};
use hostfy_engine::{EngineContext, EngineSettings, StaticCatalogSource};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

type Result<T> = std::result::Result<T, ContainerError>;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub spec: ContainerSpec,
    pub running: bool,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub containers: BTreeMap<String, FakeContainer>,
    pub networks: BTreeSet<String>,
    pub volumes: BTreeSet<String>,
    pub databases: BTreeSet<String>,
    pub pulls: Vec<String>,
    pub creates: Vec<String>,
    pub removes: Vec<String>,
    pub execs: Vec<Vec<String>>,
    /// このコンテナは healthy にならない
    pub unhealthy: BTreeSet<String>,
    /// 使用中として削除に失敗するボリューム
    pub busy_volumes: BTreeSet<String>,
    /// 作成に失敗するコンテナ
    pub failing_creates: BTreeSet<String>,
}

/// メモリ上のコンテナランタイム
///
/// psql の exec は CREATE/DROP/SELECT だけを解釈してデータベース集合を更新する。
#[derive(Debug, Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.state().pulls.clone()
    }

    pub fn creates(&self) -> Vec<String> {
        self.state().creates.clone()
    }

    pub fn spec(&self, name: &str) -> ContainerSpec {
        self.state().containers[name].spec.clone()
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.state().containers.contains_key(name)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state().containers.get(name).is_some_and(|c| c.running)
    }

    pub fn databases(&self) -> BTreeSet<String> {
        self.state().databases.clone()
    }

    /// 記録の外で作られた管理ラベル付きコンテナを置く
    pub fn add_foreign(&self, name: &str) {
        let spec = ContainerSpec::new(name, "busybox")
            .with_labels(hostfy_core::labels::managed_labels(name));
        self.state().containers.insert(
            name.to_string(),
            FakeContainer {
                spec,
                running: true,
            },
        );
    }

    pub fn add_database(&self, name: &str) {
        self.state().databases.insert(name.to_string());
    }

    pub fn clear_calls(&self) {
        let mut state = self.state();
        state.pulls.clear();
        state.creates.clear();
        state.removes.clear();
        state.execs.clear();
    }

    fn psql(state: &mut FakeState, sql: &str) -> ExecOutput {
        let target = sql.split('"').nth(1).unwrap_or_default().to_string();
        if sql.starts_with("CREATE DATABASE") {
            if !state.databases.insert(target.clone()) {
                return ExecOutput {
                    exit_code: 1,
                    output: format!("ERROR:  database \"{}\" already exists", target),
                };
            }
        } else if sql.starts_with("DROP DATABASE") {
            state.databases.remove(&target);
        } else if sql.starts_with("SELECT datname") {
            let output = state
                .databases
                .iter()
                .map(|db| format!(" {}\n", db))
                .collect();
            return ExecOutput {
                exit_code: 0,
                output,
            };
        }
        ExecOutput::default()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ensure_network(&self, name: &str) -> Result<()> {
        self.state().networks.insert(name.to_string());
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.state().pulls.push(image.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.state();
        if state.containers.contains_key(&spec.name)
            || state.failing_creates.contains(&spec.name)
        {
            return Err(ContainerError::Conflict(spec.name.clone()));
        }
        for volume in &spec.volumes {
            if let Some((source, _)) = volume.split_once(':')
                && !source.starts_with('/')
            {
                state.volumes.insert(source.to_string());
            }
        }
        state.creates.push(spec.name.clone());
        state.containers.insert(
            spec.name.clone(),
            FakeContainer {
                spec: spec.clone(),
                running: false,
            },
        );
        Ok(format!("id-{}", spec.name))
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.with_container(name, |c| c.running = true)
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.with_container(name, |c| c.running = false)
    }

    async fn restart_container(&self, name: &str) -> Result<()> {
        self.with_container(name, |c| c.running = true)
    }

    async fn remove_container(&self, name: &str, _force: bool) -> Result<()> {
        let mut state = self.state();
        if state.containers.remove(name).is_none() {
            return Err(ContainerError::NotFound {
                container: name.to_string(),
            });
        }
        state.removes.push(name.to_string());
        Ok(())
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let state = self.state();
        Ok(state.containers.get(name).map(|c| ContainerInfo {
            id: format!("id-{}", name),
            name: name.to_string(),
            image: c.spec.image.clone(),
            state: if c.running {
                ContainerState::Running
            } else {
                ContainerState::Stopped
            },
            health: HealthState::Healthy,
        }))
    }

    async fn list_by_label(&self, key: &str, value: &str) -> Result<Vec<String>> {
        let state = self.state();
        let names: Vec<String> = state
            .containers
            .iter()
            .filter(|(_, c)| c.spec.labels.get(key).is_some_and(|v| v == value))
            .map(|(name, _)| format!("/{}", name))
            .collect();
        Ok(names)
    }

    async fn logs(&self, name: &str, _tail: usize, _follow: bool) -> Result<LogStream> {
        if !self.has_container(name) {
            return Err(ContainerError::NotFound {
                container: name.to_string(),
            });
        }
        let lines = vec![Ok(format!("{} started", name))];
        Ok(futures_util::stream::iter(lines).boxed())
    }

    async fn wait_healthy(&self, name: &str, timeout: Duration) -> Result<()> {
        let state = self.state();
        let healthy = state.containers.get(name).is_some_and(|c| c.running)
            && !state.unhealthy.contains(name);
        if healthy {
            Ok(())
        } else {
            Err(ContainerError::HealthTimeout {
                container: name.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }

    async fn exec(&self, name: &str, cmd: &[String]) -> Result<ExecOutput> {
        let mut state = self.state();
        if !state.containers.get(name).is_some_and(|c| c.running) {
            return Err(ContainerError::NotFound {
                container: name.to_string(),
            });
        }
        state.execs.push(cmd.to_vec());
        let sql = cmd.last().cloned().unwrap_or_default();
        Ok(Self::psql(&mut state, &sql))
    }

    async fn remove_volumes(&self, names: &[String]) -> Result<VolumeRemoval> {
        let mut state = self.state();
        let mut result = VolumeRemoval::default();
        for name in names {
            if state.busy_volumes.contains(name) {
                result
                    .failed
                    .push((name.clone(), format!("volume is in use: {}", name)));
            } else if state.volumes.remove(name) {
                result.removed.push(name.clone());
            }
        }
        Ok(result)
    }
}

impl FakeRuntime {
    fn with_container(&self, name: &str, f: impl FnOnce(&mut FakeContainer)) -> Result<()> {
        match self.state().containers.get_mut(name) {
            Some(container) => {
                f(container);
                Ok(())
            }
            None => Err(ContainerError::NotFound {
                container: name.to_string(),
            }),
        }
    }
}

/// 一時ディレクトリの状態ストアとフェイクを束ねたテスト環境
pub struct TestEnv {
    pub dir: TempDir,
    pub runtime: Arc<FakeRuntime>,
    pub source: Arc<StaticCatalogSource>,
    pub ctx: EngineContext,
}

impl TestEnv {
    pub fn new(catalog: Catalog) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let runtime = Arc::new(FakeRuntime::default());
        let source = Arc::new(StaticCatalogSource::new(catalog));
        let ctx = EngineContext::new(
            store,
            source.clone(),
            runtime.clone(),
            EngineSettings::default(),
        );
        Self {
            dir,
            runtime,
            source,
            ctx,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.ctx.store
    }
}

/// テスト用カタログ
///
/// - `uptime`: 単一コンテナ、依存なし
/// - `n8n`: editor（メイン）と worker のスタック、postgres と redis に依存
/// - `chatwoot`: ルート付きのサブコンテナと UserEnvVar を持つスタック
pub fn sample_catalog() -> Catalog {
    serde_json::from_str(SAMPLE_CATALOG).unwrap()
}

pub const SAMPLE_CATALOG: &str = r#"{
  "version": "1.0",
  "updated_at": "2024-06-01",
  "services": {},
  "apps": {
    "uptime": {
      "name": "Uptime Kuma",
      "description": "Monitoring",
      "image": "louislam/uptime-kuma:1",
      "port": 3001,
      "env": { "TZ": "UTC" },
      "volumes": ["{{APP_NAME}}_data:/app/data"]
    },
    "n8n": {
      "name": "n8n",
      "description": "Workflow automation",
      "dependencies": ["postgres", "redis"],
      "shared_env": {
        "DB_POSTGRESDB_HOST": "{{SERVICE_postgres_HOST}}",
        "DB_POSTGRESDB_DATABASE": "{{APP_DATABASE}}",
        "DB_POSTGRESDB_PASSWORD": "{{SERVICE_postgres_PASSWORD}}",
        "N8N_ENCRYPTION_KEY": "{{GENERATE_SECRET_32}}",
        "WEBHOOK_URL": "https://{{APP_DOMAIN}}/"
      },
      "containers": [
        {
          "name": "editor",
          "image": "n8nio/n8n:1.0",
          "port": 5678,
          "is_main": true,
          "volumes": ["{{APP_NAME}}_data:/home/node/.n8n"]
        },
        {
          "name": "worker",
          "image": "n8nio/n8n:1.0",
          "command": "worker",
          "env": { "QUEUE_MODE": "redis" }
        }
      ]
    },
    "chatwoot": {
      "name": "Chatwoot",
      "description": "Customer support",
      "shared_env": {
        "SECRET_KEY_BASE": "{{GENERATE_SECRET_64}}",
        "FRONTEND_URL": "https://{{APP_DOMAIN}}"
      },
      "containers": [
        {
          "name": "web",
          "image": "chatwoot/chatwoot:v3",
          "port": 3000,
          "is_main": true,
          "user_env": [
            { "key": "ADMIN_PASSWORD", "prompt": "admin password", "default": "{{GENERATE_SECRET_16}}" }
          ]
        },
        {
          "name": "sidekiq",
          "image": "chatwoot/chatwoot:v3",
          "command": "bundle exec sidekiq"
        },
        {
          "name": "storage",
          "image": "minio/minio:latest",
          "env": { "STORAGE_URL": "https://s3.{{APP_DOMAIN}}" },
          "traefik": { "routes": [ { "subdomain": "s3.{{APP_DOMAIN}}", "port": 9000 } ] }
        }
      ]
    }
  }
}"#;
