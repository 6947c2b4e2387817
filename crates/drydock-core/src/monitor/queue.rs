use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::models::{CoreError, CoreErrorKind, Repository};
use crate::monitor::{CompletionBarrier, MonitorTask, MonitorTaskBatch, RepositoryMonitor};
use crate::orchestration::OrchestrationResult;
use crate::persistence::{PageRequest, RepositoryStore};

#[derive(Default)]
struct MonitorState {
    snapshot: Option<Arc<Vec<Repository>>>,
    should_reload: bool,
}

/// Produces one batch of monitor tasks per cycle from a cached snapshot of
/// every repository in every domain.
///
/// Share a single instance per process: the snapshot and the reload flag are
/// only consistent within one queue.
pub struct MonitorQueue {
    repositories: Arc<dyn RepositoryStore>,
    monitor: Arc<dyn RepositoryMonitor>,
    page_size: usize,
    state: Mutex<MonitorState>,
}

impl MonitorQueue {
    pub fn new(
        repositories: Arc<dyn RepositoryStore>,
        monitor: Arc<dyn RepositoryMonitor>,
        page_size: usize,
    ) -> OrchestrationResult<Self> {
        if page_size == 0 {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "monitor page size must be greater than zero",
            ));
        }

        Ok(Self {
            repositories,
            monitor,
            page_size,
            state: Mutex::new(MonitorState::default()),
        })
    }

    pub fn from_config(
        context: &EngineContext,
        monitor: Arc<dyn RepositoryMonitor>,
        config: &EngineConfig,
    ) -> OrchestrationResult<Self> {
        Self::new(
            context.repositories.clone(),
            monitor,
            config.monitor_page_size,
        )
    }

    /// Requests (or cancels) a snapshot rebuild on the next `get_tasks`.
    pub fn set_reload(&self, should_reload: bool) -> OrchestrationResult<()> {
        self.lock_state()?.should_reload = should_reload;
        Ok(())
    }

    pub fn get_tasks(&self) -> OrchestrationResult<MonitorTaskBatch> {
        let mut state = self.lock_state()?;

        if state.should_reload || state.snapshot.is_none() {
            state.snapshot = Some(Arc::new(self.list_all()?));
            state.should_reload = false;
        }
        let snapshot = state.snapshot.clone().unwrap_or_default();
        drop(state);

        let (barrier, guards) = CompletionBarrier::new(snapshot.len());
        let tasks = snapshot
            .iter()
            .cloned()
            .zip(guards)
            .map(|(repository, guard)| MonitorTask::new(repository, self.monitor.clone(), guard))
            .collect();

        Ok(MonitorTaskBatch::new(tasks, barrier))
    }

    fn list_all(&self) -> OrchestrationResult<Vec<Repository>> {
        let mut repositories = Vec::new();
        let mut request = PageRequest::first(self.page_size);
        let mut pages = 0usize;
        loop {
            let page = self
                .repositories
                .list_repositories(None, &request)
                .inspect_err(|error| {
                    tracing::error!(
                        pages,
                        loaded = repositories.len(),
                        kind = ?error.kind,
                        message = %error.message,
                        "failed to reload monitored repositories; keeping previous snapshot"
                    );
                })?;
            pages += 1;
            repositories.extend(page.items);

            match page.next_marker {
                Some(marker) => request = request.after(marker),
                None => break,
            }
        }

        tracing::info!(
            repositories = repositories.len(),
            pages,
            "reloaded monitored repositories"
        );
        Ok(repositories)
    }

    fn lock_state(&self) -> OrchestrationResult<MutexGuard<'_, MonitorState>> {
        self.state
            .lock()
            .map_err(|_| CoreError::internal("monitor queue mutex poisoned"))
    }
}
