use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CoreError, DurableRecord};
use crate::orchestration::OrchestrationResult;
use crate::persistence::CheckpointStore;
use crate::pipeline::{PipelineEngine, PipelineProgress, PipelineRunRequest};
use crate::tasks::{Runnable, TaskFactory, WorkItem, exclusion_key, require_non_empty};

/// Runs a pipeline against one image, identified by tag, manifest id or both.
///
/// Each request carries its own `requestId`. Redeliveries of the same record
/// share it and resume from the request's checkpoint; a new request for the
/// same image gets a fresh id and always starts from scratch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTask {
    domain: String,
    #[serde(default)]
    tag: Option<String>,
    container_repo_id: String,
    #[serde(default)]
    manifest_id: Option<String>,
    pipeline_id: String,
    #[serde(default)]
    start_component_id: Option<String>,
    #[serde(default)]
    destination_tag: Option<String>,
    /// Absent on records written without one; such runs are not checkpointed.
    #[serde(default)]
    request_id: Option<Uuid>,
}

impl PipelineTask {
    pub fn new(
        domain: impl Into<String>,
        container_repo_id: impl Into<String>,
        pipeline_id: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            tag: None,
            container_repo_id: container_repo_id.into(),
            manifest_id: None,
            pipeline_id: pipeline_id.into(),
            start_component_id: None,
            destination_tag: None,
            request_id: Some(Uuid::new_v4()),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_manifest_id(mut self, manifest_id: impl Into<String>) -> Self {
        self.manifest_id = Some(manifest_id.into());
        self
    }

    pub fn starting_at(mut self, component_id: impl Into<String>) -> Self {
        self.start_component_id = Some(component_id.into());
        self
    }

    pub fn with_destination_tag(mut self, tag: impl Into<String>) -> Self {
        self.destination_tag = Some(tag.into());
        self
    }

    /// Replaces the generated request id, e.g. with an upstream delivery id.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn request_id(&self) -> Option<Uuid> {
        self.request_id
    }

    /// Key of this request's progress checkpoint.
    pub fn checkpoint_key(&self) -> Option<String> {
        self.request_id
            .map(|request_id| format!("{}/{}/{request_id}", Self::KIND, self.pipeline_id))
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn container_repo_id(&self) -> &str {
        &self.container_repo_id
    }

    pub fn manifest_id(&self) -> Option<&str> {
        self.manifest_id.as_deref()
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn start_component_id(&self) -> Option<&str> {
        self.start_component_id.as_deref()
    }

    pub fn destination_tag(&self) -> Option<&str> {
        self.destination_tag.as_deref()
    }

    /// Lock over the processed image; the tag wins over the manifest id.
    pub fn lock_id(&self) -> OrchestrationResult<String> {
        let reference = [&self.tag, &self.manifest_id]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty());
        exclusion_key(&self.domain, &self.container_repo_id, reference)
    }

    pub fn run_request(&self, resume_after_component_id: Option<String>) -> PipelineRunRequest {
        PipelineRunRequest {
            domain: self.domain.clone(),
            pipeline_id: self.pipeline_id.clone(),
            repository_id: self.container_repo_id.clone(),
            tag: self.tag.clone(),
            manifest_id: self.manifest_id.clone(),
            start_component_id: self.start_component_id.clone(),
            resume_after_component_id,
            destination_tag: self.destination_tag.clone(),
        }
    }
}

impl WorkItem for PipelineTask {
    const KIND: &'static str = "pipe";

    fn domain(&self) -> &str {
        &self.domain
    }

    fn subject_id(&self) -> &str {
        &self.pipeline_id
    }

    fn validate(&self) -> OrchestrationResult<()> {
        let subject = self.pipeline_id.as_str();
        require_non_empty(&self.domain, "domain", &self.domain, subject)?;
        require_non_empty(&self.pipeline_id, "pipelineId", &self.domain, subject)?;
        require_non_empty(
            &self.container_repo_id,
            "containerRepoId",
            &self.domain,
            subject,
        )?;

        if self.lock_id().is_err() {
            return Err(CoreError::invalid_work_item(
                "a pipeline task needs a tag or a manifest id",
            )
            .attribute(&self.domain, subject));
        }
        Ok(())
    }

    fn exclusion_keys(&self) -> OrchestrationResult<BTreeSet<String>> {
        Ok(BTreeSet::from([self.lock_id()?]))
    }
}

pub struct PipelineTaskFactory {
    engine: Arc<PipelineEngine>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl PipelineTaskFactory {
    pub fn new(engine: Arc<PipelineEngine>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            engine,
            checkpoints,
        }
    }
}

impl TaskFactory for PipelineTaskFactory {
    fn kind(&self) -> &'static str {
        PipelineTask::KIND
    }

    fn to_runnable(&self, record: &DurableRecord) -> OrchestrationResult<Box<dyn Runnable>> {
        Ok(Box::new(PipelineTaskRun {
            task: PipelineTask::from_durable_record(record)?,
            engine: self.engine.clone(),
            checkpoints: self.checkpoints.clone(),
        }))
    }
}

struct PipelineTaskRun {
    task: PipelineTask,
    engine: Arc<PipelineEngine>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl Runnable for PipelineTaskRun {
    fn run(self: Box<Self>) -> OrchestrationResult<()> {
        let Some(checkpoint_key) = self.task.checkpoint_key() else {
            return self
                .engine
                .run(&self.task.run_request(None), None)
                .map(|_| ());
        };

        let resume_after = self.checkpoints.last_completed(&checkpoint_key)?;
        if let Some(component_id) = &resume_after {
            tracing::info!(
                pipeline_id = self.task.pipeline_id(),
                checkpoint_key = %checkpoint_key,
                component_id = %component_id,
                "resuming pipeline after completed component"
            );
        }

        let progress = CheckpointProgress {
            checkpoints: self.checkpoints.as_ref(),
            checkpoint_key: &checkpoint_key,
        };
        let outcome = self.engine.run(
            &self.task.run_request(resume_after),
            Some(&progress as &dyn PipelineProgress),
        );

        match outcome {
            Ok(_) => self.checkpoints.clear(&checkpoint_key),
            Err(error) => {
                // A fatal failure is never redelivered, so its progress is dead.
                if !error.is_retryable()
                    && let Err(clear_error) = self.checkpoints.clear(&checkpoint_key)
                {
                    tracing::warn!(
                        checkpoint_key = %checkpoint_key,
                        kind = ?clear_error.kind,
                        message = %clear_error.message,
                        "failed to clear checkpoint of permanently failed pipeline"
                    );
                }
                Err(error)
            }
        }
    }
}

struct CheckpointProgress<'a> {
    checkpoints: &'a dyn CheckpointStore,
    checkpoint_key: &'a str,
}

impl PipelineProgress for CheckpointProgress<'_> {
    fn component_completed(&self, component_id: &str) -> OrchestrationResult<()> {
        self.checkpoints
            .record_completed(self.checkpoint_key, component_id)
    }
}
