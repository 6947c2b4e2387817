use std::sync::Arc;

use crate::persistence::{CheckpointStore, ManifestStore, PipelineStore, RepositoryStore};
use crate::registry::CrossRepositoryCopy;
use crate::sync::RepositorySync;

/// Collaborators shared by every workflow, built once at startup and passed
/// to the engine, the task factories and the monitor queue.
#[derive(Clone)]
pub struct EngineContext {
    pub repositories: Arc<dyn RepositoryStore>,
    pub manifests: Arc<dyn ManifestStore>,
    pub pipelines: Arc<dyn PipelineStore>,
    pub copier: Arc<dyn CrossRepositoryCopy>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

impl EngineContext {
    pub fn repository_sync(&self) -> Arc<RepositorySync> {
        Arc::new(RepositorySync::new(
            self.repositories.clone(),
            self.manifests.clone(),
            self.copier.clone(),
        ))
    }
}
