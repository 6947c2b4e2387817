use std::sync::Arc;

use crate::models::Repository;
use crate::monitor::{CompletionBarrier, CompletionGuard};
use crate::orchestration::OrchestrationResult;

/// Per-repository check run once per monitor cycle.
pub trait RepositoryMonitor: Send + Sync {
    fn check(&self, repository: &Repository) -> OrchestrationResult<()>;
}

pub struct MonitorTask {
    repository: Repository,
    monitor: Arc<dyn RepositoryMonitor>,
    _guard: CompletionGuard,
}

impl MonitorTask {
    pub(crate) fn new(
        repository: Repository,
        monitor: Arc<dyn RepositoryMonitor>,
        guard: CompletionGuard,
    ) -> Self {
        Self {
            repository,
            monitor,
            _guard: guard,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Checks the repository. The batch barrier is counted down when this
    /// returns, including when the check fails or panics.
    pub fn run(self) -> OrchestrationResult<()> {
        let result = self.monitor.check(&self.repository);
        if let Err(error) = &result {
            tracing::warn!(
                domain = %self.repository.domain,
                repository_id = %self.repository.id,
                provider = self.repository.provider.as_str(),
                kind = ?error.kind,
                message = %error.message,
                "repository monitor check failed"
            );
        }
        result
    }
}

/// Every task generated by one monitor cycle plus the barrier they share.
pub struct MonitorTaskBatch {
    tasks: Vec<MonitorTask>,
    barrier: CompletionBarrier,
}

impl MonitorTaskBatch {
    pub(crate) fn new(tasks: Vec<MonitorTask>, barrier: CompletionBarrier) -> Self {
        Self { tasks, barrier }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[MonitorTask] {
        &self.tasks
    }

    pub fn barrier(&self) -> &CompletionBarrier {
        &self.barrier
    }

    pub fn into_parts(self) -> (Vec<MonitorTask>, CompletionBarrier) {
        (self.tasks, self.barrier)
    }

    /// Runs every task on the tokio blocking pool and returns the barrier to
    /// wait on. Must be called from within a tokio runtime.
    pub fn spawn(self) -> CompletionBarrier {
        for task in self.tasks {
            tokio::task::spawn_blocking(move || task.run());
        }
        self.barrier
    }
}
