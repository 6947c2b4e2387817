pub mod task;
pub mod workflow;

pub use task::{RepoSyncTask, RepoSyncTaskFactory};
pub use workflow::{RepositorySync, SyncOutcome};

pub(crate) use workflow::{ensure_local_write_target, resolve_repository};
