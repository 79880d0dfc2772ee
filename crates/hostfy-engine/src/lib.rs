//! hostfy のデプロイエンジン
//!
//! カタログのアプリを共有サービス（PostgreSQL・Redis・Traefik）と一緒に
//! コンテナとして配置し、インストール済みの記録と実際のコンテナを一致させる。
//!
//! すべてのワークフローは [`EngineContext`] を受け取る。コンテナ操作は
//! [`hostfy_container::ContainerRuntime`] 経由なので、テストでは差し替えられる。

pub mod catalog;
pub mod cleanup;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod reconcile;
pub mod services;
pub mod status;

pub use catalog::{CatalogRepository, CatalogSource, HttpCatalogSource, StaticCatalogSource};
pub use cleanup::{CleanupAction, CleanupReport, CleanupStep, Severity};
pub use context::{EngineContext, EngineSettings};
pub use error::{EngineError, Result};
pub use lifecycle::{LifecycleAction, LifecycleReport, Target};
pub use orchestrator::{
    ContainerPlan, ImageChange, InstallReport, InstallRequest, RemoveReport, RemoveRequest,
    UpdateReport, UpdateRequest, UpgradeReport, UpgradeRequest, install, remove, update, upgrade,
};
pub use reconcile::{OrphanReport, cleanup, find_orphans};
pub use services::{EnsureOutcome, PostgresManager, ServiceDefinition, ensure_running};
