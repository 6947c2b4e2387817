pub mod config;
pub mod context;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod orchestration;
pub mod persistence;
pub mod pipeline;
pub mod registry;
pub mod sqlite;
pub mod sync;
pub mod tasks;

pub use config::EngineConfig;
pub use context::EngineContext;
pub use models::{CoreError, CoreErrorKind, DurableRecord};
pub use orchestration::OrchestrationResult;
