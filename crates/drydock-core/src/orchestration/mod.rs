pub mod runtime_queue;

pub use runtime_queue::InMemoryTaskQueue;

use std::collections::BTreeSet;
use std::time::SystemTime;

use crate::models::CoreError;

pub type OrchestrationResult<T> = Result<T, CoreError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RecordStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordSnapshot {
    pub id: RecordId,
    pub kind: String,
    pub subject_id: String,
    pub exclusion_keys: BTreeSet<String>,
    pub status: RecordStatus,
    pub enqueued_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
    pub error: Option<CoreError>,
}
