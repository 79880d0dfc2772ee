use crate::catalog::{CatalogRepository, CatalogSource};
use hostfy_config::GlobalConfig;
use hostfy_container::ContainerRuntime;
use hostfy_core::StateStore;
use std::sync::Arc;
use std::time::Duration;

/// メインコンテナの healthy 待ちの上限
pub const MAIN_HEALTH_TIMEOUT: Duration = Duration::from_secs(120);

/// カタログキャッシュの有効期間
pub const CATALOG_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// 管理対象コンテナが接続する共有ネットワーク
    pub network: String,
    pub main_health_timeout: Duration,
    pub catalog_ttl: Duration,
    /// プロキシのダッシュボード（:8080）を公開するか
    pub proxy_dashboard: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            network: hostfy_config::DEFAULT_NETWORK.to_string(),
            main_health_timeout: MAIN_HEALTH_TIMEOUT,
            catalog_ttl: CATALOG_TTL,
            proxy_dashboard: false,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            network: config.network.clone(),
            proxy_dashboard: config.traefik.dashboard,
            ..Default::default()
        }
    }
}

/// すべてのワークフローに渡す実行コンテキスト
#[derive(Clone)]
pub struct EngineContext {
    pub store: StateStore,
    pub catalog: CatalogRepository,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub settings: EngineSettings,
}

impl EngineContext {
    pub fn new(
        store: StateStore,
        source: Arc<dyn CatalogSource>,
        runtime: Arc<dyn ContainerRuntime>,
        settings: EngineSettings,
    ) -> Self {
        let catalog = CatalogRepository::new(store.clone(), source, settings.catalog_ttl);
        Self {
            store,
            catalog,
            runtime,
            settings,
        }
    }
}
