//! カタログリポジトリ
//!
//! リモートのカタログを取得し、状態ディレクトリにキャッシュする。
//! キャッシュはファイルの更新時刻から TTL 以内であれば再利用する。

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use hostfy_core::store::{read_json, write_json};
use hostfy_core::{App, Catalog, Service, StateStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// カタログの取得元
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Catalog>;
}

/// HTTP(S) でカタログJSONを取得する
pub struct HttpCatalogSource {
    client: reqwest::Client,
}

impl HttpCatalogSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hostfy/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::CatalogUnavailable {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self, url: &str) -> Result<Catalog> {
        let unavailable = |message: String| EngineError::CatalogUnavailable {
            url: url.to_string(),
            message,
        };

        debug!(url = %url, "Fetching catalog");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP {}", response.status())));
        }

        response
            .json::<Catalog>()
            .await
            .map_err(|e| unavailable(format!("不正なカタログ形式: {}", e)))
    }
}

/// 固定のカタログを返す取得元（オフライン環境とテスト用）
#[derive(Default)]
pub struct StaticCatalogSource {
    catalog: Mutex<Catalog>,
    unavailable: AtomicBool,
    fetches: AtomicUsize,
}

impl StaticCatalogSource {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            ..Default::default()
        }
    }

    pub fn set_catalog(&self, catalog: Catalog) {
        *self.catalog.lock().unwrap_or_else(|e| e.into_inner()) = catalog;
    }

    /// `true` にすると以降の取得は CatalogUnavailable になる
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch(&self, url: &str) -> Result<Catalog> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::CatalogUnavailable {
                url: url.to_string(),
                message: "source is offline".to_string(),
            });
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.catalog.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

/// キャッシュ付きのカタログアクセス
#[derive(Clone)]
pub struct CatalogRepository {
    store: StateStore,
    source: Arc<dyn CatalogSource>,
    ttl: Duration,
}

impl CatalogRepository {
    pub fn new(store: StateStore, source: Arc<dyn CatalogSource>, ttl: Duration) -> Self {
        Self { store, source, ttl }
    }

    /// カタログを取得
    ///
    /// `force_refresh` でなければ TTL 以内のキャッシュを返す。取得に失敗した場合は
    /// キャッシュにフォールバックせず CatalogUnavailable を返す。
    pub async fn fetch(&self, force_refresh: bool) -> Result<Catalog> {
        if !force_refresh && let Some(catalog) = self.fresh_cache() {
            debug!("Using cached catalog");
            return Ok(catalog);
        }
        self.refresh().await
    }

    /// 取得に失敗した場合のみ、期限切れのキャッシュを警告付きで返す
    pub async fn fetch_allow_stale(&self, force_refresh: bool) -> Result<Catalog> {
        match self.fetch(force_refresh).await {
            Ok(catalog) => Ok(catalog),
            Err(e @ EngineError::CatalogUnavailable { .. }) => match self.cached() {
                Some(catalog) => {
                    warn!(error = %e, "Catalog source unavailable, using stale cache");
                    Ok(catalog)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    pub async fn get_app(&self, id: &str) -> Result<App> {
        let catalog = self.fetch(false).await?;
        find_app(&catalog, id).cloned()
    }

    pub async fn get_service(&self, id: &str) -> Result<Service> {
        let catalog = self.fetch(false).await?;
        catalog
            .services
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::CatalogEntryNotFound(id.to_string()))
    }

    /// 期限を問わずキャッシュを読む（壊れていれば `None`）
    pub fn cached(&self) -> Option<Catalog> {
        let path = self.store.catalog_cache_path();
        match read_json(&path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable catalog cache");
                None
            }
        }
    }

    fn fresh_cache(&self) -> Option<Catalog> {
        let modified = std::fs::metadata(self.store.catalog_cache_path())
            .and_then(|m| m.modified())
            .ok()?;
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age >= self.ttl {
            return None;
        }
        self.cached()
    }

    async fn refresh(&self) -> Result<Catalog> {
        let mut config = self.store.load_config()?;
        let catalog = self.source.fetch(&config.catalog_url).await?;

        self.store.ensure_directories()?;
        write_json(&self.store.catalog_cache_path(), &catalog, false)?;
        config.catalog_updated_at = Some(Utc::now());
        self.store.save_config(&config)?;

        info!(
            url = %config.catalog_url,
            apps = catalog.apps.len(),
            services = catalog.services.len(),
            "Catalog refreshed"
        );
        Ok(catalog)
    }
}

pub fn find_app<'a>(catalog: &'a Catalog, id: &str) -> Result<&'a App> {
    catalog
        .apps
        .get(id)
        .ok_or_else(|| EngineError::CatalogEntryNotFound(id.to_string()))
}
