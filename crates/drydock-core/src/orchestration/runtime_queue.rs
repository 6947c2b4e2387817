use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::time::timeout;

use crate::models::{CoreError, CoreErrorKind, DurableRecord};
use crate::orchestration::{OrchestrationResult, RecordId, RecordSnapshot, RecordStatus};
use crate::tasks::TaskFactoryRegistry;

/// Reference queue/lock harness.
///
/// Every enqueued record runs on its own tokio task once all of its
/// exclusion keys are held. Keys are acquired in sorted order, so two records
/// with overlapping key sets can never deadlock each other. A runnable that
/// returns `Ok` is acked (`Completed`); an error or a panic is a nack
/// (`Failed`). Retrying a nacked record is left to the caller.
///
/// Runnables execute inside a `record` span carrying the record id, kind and
/// subject. Terminal records stay queryable until [`Self::prune_terminal`]
/// drops them.
#[derive(Clone)]
pub struct InMemoryTaskQueue {
    inner: Arc<Mutex<QueueState>>,
    registry: TaskFactoryRegistry,
}

#[derive(Default)]
struct QueueState {
    next_record_id: u64,
    records: HashMap<RecordId, RecordSnapshot>,
    key_locks: HashMap<String, Arc<Mutex<()>>>,
    status_channels: HashMap<RecordId, watch::Sender<RecordStatus>>,
}

impl InMemoryTaskQueue {
    pub fn new(registry: TaskFactoryRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueState::default())),
            registry,
        }
    }

    pub async fn enqueue(&self, record: DurableRecord) -> OrchestrationResult<RecordId> {
        if record.exclusion_keys.is_empty() {
            return Err(CoreError::invalid_work_item(format!(
                "record of kind '{}' carries no exclusion keys",
                record.kind
            ))
            .with_subject(record.subject_id.clone()));
        }

        let (record_id, key_locks) = {
            let mut state = self.inner.lock().await;
            let record_id = RecordId(state.next_record_id);
            state.next_record_id = state.next_record_id.saturating_add(1);

            state.records.insert(
                record_id,
                RecordSnapshot {
                    id: record_id,
                    kind: record.kind.clone(),
                    subject_id: record.subject_id.clone(),
                    exclusion_keys: record.exclusion_keys.clone(),
                    status: RecordStatus::Queued,
                    enqueued_at: SystemTime::now(),
                    started_at: None,
                    finished_at: None,
                    error: None,
                },
            );

            let key_locks = record
                .exclusion_keys
                .iter()
                .map(|key| {
                    state
                        .key_locks
                        .entry(key.clone())
                        .or_insert_with(|| Arc::new(Mutex::new(())))
                        .clone()
                })
                .collect::<Vec<_>>();

            let (status_sender, _) = watch::channel(RecordStatus::Queued);
            state.status_channels.insert(record_id, status_sender);

            (record_id, key_locks)
        };

        tracing::debug!(
            record_id = record_id.0,
            kind = %record.kind,
            subject = %record.subject_id,
            exclusion_keys = ?record.exclusion_keys,
            "enqueued durable record"
        );

        let inner = self.inner.clone();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let guards = acquire_all(key_locks).await;
            set_running(&inner, record_id).await;

            let kind = record.kind.clone();
            let subject = record.subject_id.clone();
            let exclusion_keys = record.exclusion_keys.clone();
            match execute(&registry, record_id, record).await {
                Ok(()) => set_terminal(&inner, record_id, RecordStatus::Completed, None).await,
                Err(error) => {
                    tracing::error!(
                        record_id = record_id.0,
                        kind = %kind,
                        subject = %subject,
                        exclusion_keys = ?exclusion_keys,
                        error_kind = ?error.kind,
                        retryable = error.is_retryable(),
                        message = %error.message,
                        "durable record failed"
                    );
                    set_terminal(&inner, record_id, RecordStatus::Failed, Some(error)).await;
                }
            }

            drop(guards);
            release_idle_locks(&inner).await;
        });

        Ok(record_id)
    }

    pub async fn snapshot(&self, record_id: RecordId) -> OrchestrationResult<RecordSnapshot> {
        let state = self.inner.lock().await;
        state
            .records
            .get(&record_id)
            .cloned()
            .ok_or_else(|| record_lookup_error(record_id))
    }

    pub async fn status(&self, record_id: RecordId) -> OrchestrationResult<RecordStatus> {
        Ok(self.snapshot(record_id).await?.status)
    }

    /// Forgets every completed or failed record and returns how many were
    /// dropped. Their ids become unknown to `status` and `wait_for_terminal`.
    pub async fn prune_terminal(&self) -> usize {
        let mut state = self.inner.lock().await;
        let terminal = state
            .records
            .iter()
            .filter(|(_, record)| record.status.is_terminal())
            .map(|(record_id, _)| *record_id)
            .collect::<Vec<_>>();
        for record_id in &terminal {
            state.records.remove(record_id);
            state.status_channels.remove(record_id);
        }
        terminal.len()
    }

    pub async fn wait_for_terminal(
        &self,
        record_id: RecordId,
        timeout_duration: Option<Duration>,
    ) -> OrchestrationResult<RecordSnapshot> {
        let mut receiver = {
            let state = self.inner.lock().await;
            state
                .status_channels
                .get(&record_id)
                .map(watch::Sender::subscribe)
                .ok_or_else(|| record_lookup_error(record_id))?
        };

        let wait = async move {
            receiver
                .wait_for(|status| status.is_terminal())
                .await
                .map(|_| ())
        };

        let outcome = match timeout_duration {
            Some(duration) => timeout(duration, wait).await.map_err(|_| {
                CoreError::new(
                    CoreErrorKind::Timeout,
                    format!(
                        "timed out waiting for record '{}' to complete",
                        record_id.0
                    ),
                )
            })?,
            None => wait.await,
        };
        outcome.map_err(|_| {
            CoreError::internal(format!(
                "status channel for record '{}' closed unexpectedly",
                record_id.0
            ))
        })?;

        self.snapshot(record_id).await
    }
}

async fn acquire_all(key_locks: Vec<Arc<Mutex<()>>>) -> Vec<OwnedMutexGuard<()>> {
    let mut guards = Vec::with_capacity(key_locks.len());
    for lock in key_locks {
        guards.push(lock.lock_owned().await);
    }
    guards
}

async fn execute(
    registry: &TaskFactoryRegistry,
    record_id: RecordId,
    record: DurableRecord,
) -> OrchestrationResult<()> {
    let runnable = registry.rehydrate(&record)?;
    let span = tracing::info_span!(
        "record",
        record_id = record_id.0,
        kind = %record.kind,
        subject = %record.subject_id
    );
    tokio::task::spawn_blocking(move || span.in_scope(|| runnable.run()))
        .await
        .map_err(|join_error| {
            CoreError::internal(format!("record execution join failure: {join_error}"))
                .with_subject(record.subject_id.clone())
        })?
}

async fn set_running(inner: &Arc<Mutex<QueueState>>, record_id: RecordId) {
    let mut state = inner.lock().await;
    if let Some(record) = state.records.get_mut(&record_id) {
        record.status = RecordStatus::Running;
        record.started_at = Some(SystemTime::now());
    }
    if let Some(sender) = state.status_channels.get(&record_id) {
        sender.send_replace(RecordStatus::Running);
    }
}

async fn set_terminal(
    inner: &Arc<Mutex<QueueState>>,
    record_id: RecordId,
    status: RecordStatus,
    error: Option<CoreError>,
) {
    let mut state = inner.lock().await;
    if let Some(record) = state.records.get_mut(&record_id) {
        record.status = status;
        record.finished_at = Some(SystemTime::now());
        record.error = error;
    }
    if let Some(sender) = state.status_channels.get(&record_id) {
        sender.send_replace(status);
    }
}

async fn release_idle_locks(inner: &Arc<Mutex<QueueState>>) {
    let mut state = inner.lock().await;
    // The map's own handle is the only reference left once no record holds
    // or awaits the key.
    state.key_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
}

fn record_lookup_error(record_id: RecordId) -> CoreError {
    CoreError::new(
        CoreErrorKind::InvalidInput,
        format!("unknown record id '{}'", record_id.0),
    )
}
