use std::sync::Arc;

use crate::models::{CoreError, CoreErrorKind, Repository};
use crate::orchestration::OrchestrationResult;
use crate::persistence::{ManifestStore, RepositoryStore};
use crate::registry::{CopyRequest, CrossRepositoryCopy};
use crate::sync::RepoSyncTask;
use crate::tasks::WorkItem;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncOutcome {
    Removed {
        removed: Vec<String>,
        absent: Vec<String>,
    },
    Copied {
        tags: Vec<String>,
    },
}

/// Reconciles destination repository tags with a source image.
pub struct RepositorySync {
    repositories: Arc<dyn RepositoryStore>,
    manifests: Arc<dyn ManifestStore>,
    copier: Arc<dyn CrossRepositoryCopy>,
}

impl RepositorySync {
    pub fn new(
        repositories: Arc<dyn RepositoryStore>,
        manifests: Arc<dyn ManifestStore>,
        copier: Arc<dyn CrossRepositoryCopy>,
    ) -> Self {
        Self {
            repositories,
            manifests,
            copier,
        }
    }

    pub fn execute(&self, task: &RepoSyncTask) -> OrchestrationResult<SyncOutcome> {
        let lock_id = task.lock_id()?;
        tracing::debug!(lock_id = %lock_id, "starting repository sync");

        let outcome = match task.manifest_digest_sha() {
            None => self.remove(task),
            Some(digest) => self.add(task, digest),
        }
        .map_err(|error| error.attribute(task.domain(), task.destination_repo_id()));

        match &outcome {
            Ok(outcome) => {
                tracing::debug!(lock_id = %lock_id, outcome = ?outcome, "finished repository sync");
            }
            Err(error) => {
                tracing::error!(
                    lock_id = %lock_id,
                    domain = task.domain(),
                    source = task.source_repo_id(),
                    kind = ?error.kind,
                    message = %error.message,
                    "failed repository sync"
                );
            }
        }

        outcome
    }

    fn remove(&self, task: &RepoSyncTask) -> OrchestrationResult<SyncOutcome> {
        let mut removed = Vec::new();
        let mut absent = Vec::new();
        for tag in task.image_tags() {
            if self
                .manifests
                .remove_tag_binding(task.domain(), task.destination_repo_id(), tag)?
            {
                removed.push(tag.clone());
            } else {
                absent.push(tag.clone());
            }
        }
        Ok(SyncOutcome::Removed { removed, absent })
    }

    fn add(&self, task: &RepoSyncTask, digest: &str) -> OrchestrationResult<SyncOutcome> {
        let source = resolve_repository(
            self.repositories.as_ref(),
            task.domain(),
            task.source_repo_id(),
            "source",
        )?;
        let destination = resolve_repository(
            self.repositories.as_ref(),
            task.domain(),
            task.destination_repo_id(),
            "destination",
        )?;
        ensure_local_write_target(&destination)?;

        self.copier.copy(&CopyRequest {
            source: &source,
            destination: &destination,
            source_reference: digest,
            destination_tags: task.image_tags(),
        })?;

        Ok(SyncOutcome::Copied {
            tags: task.image_tags().to_vec(),
        })
    }
}

pub(crate) fn resolve_repository(
    repositories: &dyn RepositoryStore,
    domain: &str,
    repository_id: &str,
    role: &str,
) -> OrchestrationResult<Repository> {
    repositories
        .get_repository(domain, repository_id)?
        .ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::RepositoryNotFound,
                format!("failed to find {role} repository '{repository_id}'"),
            )
            .with_domain(domain)
        })
}

pub(crate) fn ensure_local_write_target(destination: &Repository) -> OrchestrationResult<()> {
    if destination.is_local_write_target() {
        return Ok(());
    }
    Err(CoreError::new(
        CoreErrorKind::UnsupportedDestination,
        format!(
            "can only copy into a local repository; destination repository '{}' has provider '{}'",
            destination.id,
            destination.provider.as_str()
        ),
    )
    .with_domain(destination.domain.clone()))
}
