mod support;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drydock_core::models::{ComponentKind, CoreError, CoreErrorKind, DurableRecord};
use drydock_core::orchestration::{InMemoryTaskQueue, OrchestrationResult, RecordStatus};
use drydock_core::persistence::CheckpointStore;
use drydock_core::pipeline::{ComponentHandler, PipelineEngine, PipelineTask};
use drydock_core::sync::RepoSyncTask;
use drydock_core::tasks::{Runnable, TaskFactory, TaskFactoryRegistry, WorkItem};

use support::{
    Fixture, RecordingHandler, copy_component, notify_component, pipeline, scan_component,
};

const WAIT: Option<Duration> = Some(Duration::from_secs(2));

#[derive(Default)]
struct Concurrency {
    current: AtomicUsize,
    peak: AtomicUsize,
    runs: AtomicUsize,
}

struct SleepFactory {
    concurrency: Arc<Concurrency>,
}

impl TaskFactory for SleepFactory {
    fn kind(&self) -> &'static str {
        "test:sleep"
    }

    fn to_runnable(&self, record: &DurableRecord) -> OrchestrationResult<Box<dyn Runnable>> {
        Ok(Box::new(SleepRun {
            concurrency: self.concurrency.clone(),
            fail: record.payload == b"fail",
        }))
    }
}

struct SleepRun {
    concurrency: Arc<Concurrency>,
    fail: bool,
}

impl Runnable for SleepRun {
    fn run(self: Box<Self>) -> OrchestrationResult<()> {
        self.concurrency.runs.fetch_add(1, Ordering::SeqCst);
        let now = self.concurrency.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.concurrency.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(60));
        self.concurrency.current.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(CoreError::new(CoreErrorKind::ComponentFailure, "boom"));
        }
        Ok(())
    }
}

fn sleep_queue() -> (InMemoryTaskQueue, Arc<Concurrency>) {
    let concurrency = Arc::new(Concurrency::default());
    let registry = TaskFactoryRegistry::new([Arc::new(SleepFactory {
        concurrency: concurrency.clone(),
    }) as Arc<dyn TaskFactory>])
    .unwrap();
    (InMemoryTaskQueue::new(registry), concurrency)
}

fn sleep_record(keys: &[&str], payload: &[u8]) -> DurableRecord {
    DurableRecord {
        kind: "test:sleep".to_string(),
        subject_id: "subject".to_string(),
        exclusion_keys: keys.iter().map(|key| key.to_string()).collect::<BTreeSet<_>>(),
        payload: payload.to_vec(),
    }
}

#[tokio::test]
async fn overlapping_keys_are_serialized() {
    let (queue, concurrency) = sleep_queue();

    let first = queue
        .enqueue(sleep_record(&["acme/r1/latest", "acme/r1/v2"], b""))
        .await
        .unwrap();
    let second = queue
        .enqueue(sleep_record(&["acme/r1/v2", "acme/r1/v3"], b""))
        .await
        .unwrap();

    for id in [first, second] {
        let snapshot = queue.wait_for_terminal(id, WAIT).await.unwrap();
        assert_eq!(snapshot.status, RecordStatus::Completed);
    }
    assert_eq!(concurrency.peak.load(Ordering::SeqCst), 1);
    assert_eq!(concurrency.runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn disjoint_keys_run_in_parallel() {
    let (queue, concurrency) = sleep_queue();

    let first = queue
        .enqueue(sleep_record(&["acme/r1/latest"], b""))
        .await
        .unwrap();
    let second = queue
        .enqueue(sleep_record(&["acme/r2/latest"], b""))
        .await
        .unwrap();

    queue.wait_for_terminal(first, WAIT).await.unwrap();
    queue.wait_for_terminal(second, WAIT).await.unwrap();
    assert_eq!(concurrency.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failures_are_recorded_on_the_snapshot() {
    let (queue, _) = sleep_queue();

    let id = queue
        .enqueue(sleep_record(&["acme/r1/latest"], b"fail"))
        .await
        .unwrap();
    let snapshot = queue.wait_for_terminal(id, WAIT).await.unwrap();

    assert_eq!(snapshot.status, RecordStatus::Failed);
    assert!(snapshot.started_at.is_some());
    assert!(snapshot.finished_at.is_some());
    assert_eq!(snapshot.error.unwrap().message, "boom");
}

#[tokio::test]
async fn unknown_kind_fails_without_running() {
    let (queue, concurrency) = sleep_queue();
    let mut record = sleep_record(&["acme/r1/latest"], b"");
    record.kind = "repo:gc".to_string();

    let id = queue.enqueue(record).await.unwrap();
    let snapshot = queue.wait_for_terminal(id, WAIT).await.unwrap();

    assert_eq!(snapshot.status, RecordStatus::Failed);
    assert_eq!(snapshot.error.unwrap().kind, CoreErrorKind::UnknownTaskKind);
    assert_eq!(concurrency.peak.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn prune_terminal_forgets_finished_records() {
    let (queue, _) = sleep_queue();

    let done = queue
        .enqueue(sleep_record(&["acme/r1/latest"], b""))
        .await
        .unwrap();
    let failed = queue
        .enqueue(sleep_record(&["acme/r2/latest"], b"fail"))
        .await
        .unwrap();
    queue.wait_for_terminal(done, WAIT).await.unwrap();
    queue.wait_for_terminal(failed, WAIT).await.unwrap();

    let pending = queue
        .enqueue(sleep_record(&["acme/r1/latest"], b""))
        .await
        .unwrap();
    let pruned = queue.prune_terminal().await;
    assert!(pruned >= 2, "pruned {pruned}");

    for id in [done, failed] {
        let error = queue.status(id).await.unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::InvalidInput);
    }
    let snapshot = queue.wait_for_terminal(pending, WAIT).await.unwrap();
    assert_eq!(snapshot.status, RecordStatus::Completed);
}

#[tokio::test]
async fn records_without_keys_are_rejected() {
    let (queue, _) = sleep_queue();
    let error = queue.enqueue(sleep_record(&[], b"")).await.unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidWorkItem);
}

#[tokio::test]
async fn unknown_record_lookup_fails() {
    let (queue, _) = sleep_queue();
    let error = queue
        .status(drydock_core::orchestration::RecordId(42))
        .await
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidInput);
}

struct StandardQueue {
    fixture: Fixture,
    queue: InMemoryTaskQueue,
    ran: Arc<Mutex<Vec<String>>>,
    scan: Arc<RecordingHandler>,
}

fn standard_queue() -> StandardQueue {
    let fixture = Fixture::new();
    let context = fixture.context();
    let ran = Arc::new(Mutex::new(Vec::new()));
    let scan = Arc::new(RecordingHandler::new(ComponentKind::Scan, ran.clone()));
    let notify = Arc::new(RecordingHandler::new(ComponentKind::Notify, ran.clone()));
    let engine = PipelineEngine::new(
        &context,
        [
            scan.clone() as Arc<dyn ComponentHandler>,
            notify as Arc<dyn ComponentHandler>,
        ],
    )
    .unwrap();
    let registry = TaskFactoryRegistry::standard(&context, Arc::new(engine)).unwrap();

    fixture
        .pipelines
        .insert(pipeline(
            "p1",
            vec![
                copy_component("a", "staging", None),
                scan_component("b"),
                notify_component("c"),
            ],
        ))
        .unwrap();

    StandardQueue {
        fixture,
        queue: InMemoryTaskQueue::new(registry),
        ran,
        scan,
    }
}

#[tokio::test]
async fn redelivered_pipeline_resumes_after_last_completed_component() {
    let harness = standard_queue();
    harness.scan.fail_on("b");
    let record = PipelineTask::new("acme", "r1", "p1")
        .with_tag("latest")
        .to_durable_record()
        .unwrap();
    let checkpoint_key = PipelineTask::from_durable_record(&record)
        .unwrap()
        .checkpoint_key()
        .unwrap();

    let first = harness.queue.enqueue(record.clone()).await.unwrap();
    let snapshot = harness.queue.wait_for_terminal(first, WAIT).await.unwrap();
    assert_eq!(snapshot.status, RecordStatus::Failed);
    assert!(snapshot.error.unwrap().is_retryable());
    assert_eq!(
        harness
            .fixture
            .checkpoints
            .last_completed(&checkpoint_key)
            .unwrap()
            .as_deref(),
        Some("a")
    );

    harness.scan.recover("b");
    let second = harness.queue.enqueue(record).await.unwrap();
    let snapshot = harness.queue.wait_for_terminal(second, WAIT).await.unwrap();
    assert_eq!(snapshot.status, RecordStatus::Completed);

    assert_eq!(harness.fixture.copier.copies().len(), 1);
    assert_eq!(*harness.ran.lock().unwrap(), vec!["b@latest", "c@latest"]);
    assert_eq!(
        harness
            .fixture
            .checkpoints
            .last_completed(&checkpoint_key)
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn new_request_after_tag_moves_runs_every_component() {
    let harness = standard_queue();
    harness.fixture.bind("r1", "latest", "sha256:one");
    harness.scan.fail_on("b");

    let first = PipelineTask::new("acme", "r1", "p1")
        .with_tag("latest")
        .to_durable_record()
        .unwrap();
    let id = harness.queue.enqueue(first).await.unwrap();
    let snapshot = harness.queue.wait_for_terminal(id, WAIT).await.unwrap();
    assert_eq!(snapshot.status, RecordStatus::Failed);

    harness.fixture.bind("r1", "latest", "sha256:two");
    harness.scan.recover("b");
    let fresh = PipelineTask::new("acme", "r1", "p1")
        .with_tag("latest")
        .to_durable_record()
        .unwrap();
    let id = harness.queue.enqueue(fresh).await.unwrap();
    let snapshot = harness.queue.wait_for_terminal(id, WAIT).await.unwrap();

    assert_eq!(snapshot.status, RecordStatus::Completed);
    assert_eq!(harness.fixture.copier.copies().len(), 2);
    assert_eq!(*harness.ran.lock().unwrap(), vec!["b@latest", "c@latest"]);
}

#[tokio::test]
async fn permanent_failure_clears_the_checkpoint() {
    let harness = standard_queue();
    harness
        .fixture
        .pipelines
        .insert(pipeline(
            "p2",
            vec![
                copy_component("a", "staging", None),
                copy_component("d", "mirror", None),
            ],
        ))
        .unwrap();
    let task = PipelineTask::new("acme", "r1", "p2").with_tag("latest");
    let checkpoint_key = task.checkpoint_key().unwrap();

    let id = harness
        .queue
        .enqueue(task.to_durable_record().unwrap())
        .await
        .unwrap();
    let error = harness
        .queue
        .wait_for_terminal(id, WAIT)
        .await
        .unwrap()
        .error
        .unwrap();

    assert_eq!(error.kind, CoreErrorKind::UnsupportedDestination);
    assert_eq!(harness.fixture.copier.copies().len(), 1);
    assert_eq!(
        harness
            .fixture
            .checkpoints
            .last_completed(&checkpoint_key)
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn records_without_request_id_run_from_the_start() {
    let harness = standard_queue();
    let record = DurableRecord {
        kind: "pipe".to_string(),
        subject_id: "p1".to_string(),
        exclusion_keys: ["acme/r1/latest".to_string()].into(),
        payload: br#"{"domain":"acme","tag":"latest","containerRepoId":"r1","pipelineId":"p1"}"#
            .to_vec(),
    };

    let id = harness.queue.enqueue(record).await.unwrap();
    let snapshot = harness.queue.wait_for_terminal(id, WAIT).await.unwrap();

    assert_eq!(snapshot.status, RecordStatus::Completed);
    assert_eq!(harness.fixture.copier.copies().len(), 1);
    assert_eq!(*harness.ran.lock().unwrap(), vec!["b@latest", "c@latest"]);
}

#[tokio::test]
async fn repo_sync_records_run_through_the_queue() {
    let harness = standard_queue();
    let record = RepoSyncTask::new("acme", "r1", "prod")
        .with_image_tags(["latest", "v2"])
        .with_manifest_digest_sha("sha256:abc")
        .to_durable_record()
        .unwrap();

    let id = harness.queue.enqueue(record).await.unwrap();
    let snapshot = harness.queue.wait_for_terminal(id, WAIT).await.unwrap();

    assert_eq!(snapshot.status, RecordStatus::Completed);
    assert_eq!(snapshot.kind, "repo:sync");
    let copies = harness.fixture.copier.copies();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].tags, vec!["latest", "v2"]);
}

#[tokio::test]
async fn fatal_sync_failure_is_not_retryable() {
    let harness = standard_queue();
    let record = RepoSyncTask::new("acme", "r1", "mirror")
        .image_tag("latest")
        .with_manifest_digest_sha("sha256:abc")
        .to_durable_record()
        .unwrap();

    let id = harness.queue.enqueue(record).await.unwrap();
    let error = harness
        .queue
        .wait_for_terminal(id, WAIT)
        .await
        .unwrap()
        .error
        .unwrap();

    assert_eq!(error.kind, CoreErrorKind::UnsupportedDestination);
    assert!(!error.is_retryable());
    assert_eq!(error.subject.as_deref(), Some("mirror"));
}
