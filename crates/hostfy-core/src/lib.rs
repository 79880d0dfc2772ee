//! hostfy のコア
//!
//! カタログのデータモデル、プレースホルダー展開、永続状態ストアを提供する。
//! コンテナランタイムには依存しない。

pub mod error;
pub mod labels;
pub mod model;
pub mod naming;
pub mod secret;
pub mod store;
pub mod template;

pub use error::{CoreError, Result};
pub use model::*;
pub use store::StateStore;
pub use template::{TemplateContext, has_placeholder, resolve_references};
