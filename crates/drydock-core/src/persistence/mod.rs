pub mod in_memory;

pub use in_memory::{
    InMemoryCheckpointStore, InMemoryManifestStore, InMemoryPipelineStore,
    InMemoryRepositoryStore,
};

use crate::models::{CoreError, Pipeline, RegistryManifest, Repository};

pub type PersistenceResult<T> = Result<T, CoreError>;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageRequest {
    pub page_size: usize,
    pub marker: Option<String>,
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_size,
            marker: None,
        }
    }

    pub fn after(&self, marker: impl Into<String>) -> Self {
        Self {
            page_size: self.page_size,
            marker: Some(marker.into()),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
}

pub trait MigrationStore: Send + Sync {
    fn current_version(&self) -> PersistenceResult<i64>;

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()>;
}

pub trait RepositoryStore: Send + Sync {
    fn get_repository(&self, domain: &str, id: &str) -> PersistenceResult<Option<Repository>>;

    /// Lists repositories across all domains when `domain` is `None`.
    fn list_repositories(
        &self,
        domain: Option<&str>,
        page: &PageRequest,
    ) -> PersistenceResult<Page<Repository>>;
}

pub trait ManifestStore: Send + Sync {
    fn get_manifest_by_tag(
        &self,
        domain: &str,
        repository_id: &str,
        tag: &str,
    ) -> PersistenceResult<Option<RegistryManifest>>;

    /// Returns `false` when the tag was not bound.
    fn remove_tag_binding(
        &self,
        domain: &str,
        repository_id: &str,
        tag: &str,
    ) -> PersistenceResult<bool>;
}

pub trait PipelineStore: Send + Sync {
    fn get_pipeline(&self, pipeline_id: &str) -> PersistenceResult<Option<Pipeline>>;
}

pub trait CheckpointStore: Send + Sync {
    fn last_completed(&self, checkpoint_key: &str) -> PersistenceResult<Option<String>>;

    fn record_completed(&self, checkpoint_key: &str, component_id: &str)
    -> PersistenceResult<()>;

    fn clear(&self, checkpoint_key: &str) -> PersistenceResult<()>;
}
