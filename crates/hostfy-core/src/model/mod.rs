mod app;
mod catalog;
mod secrets;

pub use app::*;
pub use catalog::*;
pub use secrets::*;
