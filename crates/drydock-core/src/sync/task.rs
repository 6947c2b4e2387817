use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{CoreError, DurableRecord};
use crate::orchestration::OrchestrationResult;
use crate::sync::RepositorySync;
use crate::tasks::{Runnable, TaskFactory, WorkItem, exclusion_key, require_non_empty};

/// Adds or removes tags on a destination repository.
///
/// Without a manifest digest the listed tags are removed from the
/// destination. With a digest they are bound to that image, copied from the
/// source repository.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSyncTask {
    domain: String,
    source_repo_id: String,
    destination_repo_id: String,
    image_tags: Vec<String>,
    #[serde(default)]
    manifest_digest_sha: Option<String>,
}

impl RepoSyncTask {
    pub fn new(
        domain: impl Into<String>,
        source_repo_id: impl Into<String>,
        destination_repo_id: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            source_repo_id: source_repo_id.into(),
            destination_repo_id: destination_repo_id.into(),
            image_tags: Vec::new(),
            manifest_digest_sha: None,
        }
    }

    pub fn image_tag(mut self, tag: impl Into<String>) -> Self {
        self.image_tags.push(tag.into());
        self
    }

    pub fn image_tags(&self) -> &[String] {
        &self.image_tags
    }

    pub fn with_image_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.image_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn manifest_digest_sha(&self) -> Option<&str> {
        self.manifest_digest_sha.as_deref()
    }

    pub fn with_manifest_digest_sha(mut self, digest: impl Into<String>) -> Self {
        self.manifest_digest_sha = Some(digest.into());
        self
    }

    pub fn source_repo_id(&self) -> &str {
        &self.source_repo_id
    }

    pub fn destination_repo_id(&self) -> &str {
        &self.destination_repo_id
    }

    pub fn is_removal(&self) -> bool {
        self.manifest_digest_sha.is_none()
    }

    /// Lock over the destination repository and tags only. The source is
    /// only read, so syncs from one source may run concurrently as long as
    /// they target different destination tags.
    pub fn lock_id(&self) -> OrchestrationResult<String> {
        exclusion_key(&self.domain, &self.destination_repo_id, &self.image_tags)
    }
}

impl WorkItem for RepoSyncTask {
    const KIND: &'static str = "repo:sync";

    fn domain(&self) -> &str {
        &self.domain
    }

    fn subject_id(&self) -> &str {
        &self.destination_repo_id
    }

    fn validate(&self) -> OrchestrationResult<()> {
        let subject = self.destination_repo_id.as_str();
        require_non_empty(&self.domain, "domain", &self.domain, subject)?;
        require_non_empty(&self.source_repo_id, "sourceRepoId", &self.domain, subject)?;
        require_non_empty(
            &self.destination_repo_id,
            "destinationRepoId",
            &self.domain,
            subject,
        )?;

        if self.image_tags.is_empty() {
            return Err(CoreError::invalid_work_item(
                "at least one image tag is required to sync",
            )
            .attribute(&self.domain, subject));
        }
        for tag in &self.image_tags {
            require_non_empty(tag, "imageTags", &self.domain, subject)?;
        }
        if let Some(digest) = &self.manifest_digest_sha {
            require_non_empty(digest, "manifestDigestSha", &self.domain, subject)?;
        }
        Ok(())
    }

    fn exclusion_keys(&self) -> OrchestrationResult<BTreeSet<String>> {
        Ok(BTreeSet::from([self.lock_id()?]))
    }
}

pub struct RepoSyncTaskFactory {
    sync: Arc<RepositorySync>,
}

impl RepoSyncTaskFactory {
    pub fn new(sync: Arc<RepositorySync>) -> Self {
        Self { sync }
    }
}

impl TaskFactory for RepoSyncTaskFactory {
    fn kind(&self) -> &'static str {
        RepoSyncTask::KIND
    }

    fn to_runnable(&self, record: &DurableRecord) -> OrchestrationResult<Box<dyn Runnable>> {
        Ok(Box::new(RepoSyncRun {
            task: RepoSyncTask::from_durable_record(record)?,
            sync: self.sync.clone(),
        }))
    }
}

struct RepoSyncRun {
    task: RepoSyncTask,
    sync: Arc<RepositorySync>,
}

impl Runnable for RepoSyncRun {
    fn run(self: Box<Self>) -> OrchestrationResult<()> {
        self.sync.execute(&self.task).map(|_| ())
    }
}
