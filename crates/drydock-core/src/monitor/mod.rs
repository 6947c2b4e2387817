pub mod barrier;
pub mod queue;
pub mod task;

pub use barrier::{CompletionBarrier, CompletionGuard};
pub use queue::MonitorQueue;
pub use task::{MonitorTask, MonitorTaskBatch, RepositoryMonitor};
