//! hostfyのコンテナランタイム層
//!
//! エンジンは [`ContainerRuntime`] トレイトだけに依存し、Docker との通信は
//! [`DockerRuntime`] が担う。

pub mod converter;
pub mod docker;
pub mod error;
pub mod registry;
pub mod runtime;
pub mod waiter;

pub use converter::*;
pub use docker::*;
pub use error::*;
pub use runtime::*;
pub use waiter::*;
