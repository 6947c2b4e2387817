use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::models::{CoreError, CoreErrorKind, Pipeline, RegistryManifest, Repository};
use crate::persistence::{
    CheckpointStore, ManifestStore, Page, PageRequest, PersistenceResult, PipelineStore,
    RepositoryStore,
};

#[derive(Default)]
pub struct InMemoryRepositoryStore {
    repositories: Mutex<BTreeMap<(String, String), Repository>>,
    list_calls: AtomicUsize,
}

impl InMemoryRepositoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repositories(repositories: impl IntoIterator<Item = Repository>) -> Self {
        let store = Self::new();
        for repository in repositories {
            // A freshly created mutex cannot be poisoned.
            let _ = store.insert(repository);
        }
        store
    }

    pub fn insert(&self, repository: Repository) -> PersistenceResult<()> {
        let mut repositories = lock(&self.repositories, "repository store")?;
        repositories.insert(
            (repository.domain.clone(), repository.id.clone()),
            repository,
        );
        Ok(())
    }

    pub fn remove(&self, domain: &str, id: &str) -> PersistenceResult<bool> {
        let mut repositories = lock(&self.repositories, "repository store")?;
        Ok(repositories
            .remove(&(domain.to_string(), id.to_string()))
            .is_some())
    }

    /// Number of `list_repositories` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

impl RepositoryStore for InMemoryRepositoryStore {
    fn get_repository(&self, domain: &str, id: &str) -> PersistenceResult<Option<Repository>> {
        let repositories = lock(&self.repositories, "repository store")?;
        Ok(repositories
            .get(&(domain.to_string(), id.to_string()))
            .cloned())
    }

    fn list_repositories(
        &self,
        domain: Option<&str>,
        page: &PageRequest,
    ) -> PersistenceResult<Page<Repository>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if page.page_size == 0 {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "page size must be greater than zero",
            ));
        }

        let offset = match page.marker.as_deref() {
            Some(marker) => marker.parse::<usize>().map_err(|_| {
                CoreError::new(
                    CoreErrorKind::InvalidInput,
                    format!("invalid repository page marker '{marker}'"),
                )
            })?,
            None => 0,
        };

        let repositories = lock(&self.repositories, "repository store")?;
        let matching = repositories
            .values()
            .filter(|repository| domain.is_none_or(|domain| repository.domain == domain))
            .collect::<Vec<_>>();

        let items = matching
            .iter()
            .skip(offset)
            .take(page.page_size)
            .map(|repository| (*repository).clone())
            .collect::<Vec<_>>();
        let consumed = offset + items.len();
        let next_marker = (consumed < matching.len()).then(|| consumed.to_string());

        Ok(Page { items, next_marker })
    }
}

#[derive(Default)]
pub struct InMemoryManifestStore {
    bindings: Mutex<HashMap<(String, String, String), RegistryManifest>>,
}

impl InMemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, manifest: RegistryManifest) -> PersistenceResult<()> {
        let mut bindings = lock(&self.bindings, "manifest store")?;
        bindings.insert(
            (
                manifest.domain.clone(),
                manifest.repository_id.clone(),
                manifest.tag.clone(),
            ),
            manifest,
        );
        Ok(())
    }

    pub fn tags(&self, domain: &str, repository_id: &str) -> PersistenceResult<Vec<String>> {
        let bindings = lock(&self.bindings, "manifest store")?;
        let mut tags = bindings
            .keys()
            .filter(|(bound_domain, bound_repository, _)| {
                bound_domain == domain && bound_repository == repository_id
            })
            .map(|(_, _, tag)| tag.clone())
            .collect::<Vec<_>>();
        tags.sort();
        Ok(tags)
    }
}

impl ManifestStore for InMemoryManifestStore {
    fn get_manifest_by_tag(
        &self,
        domain: &str,
        repository_id: &str,
        tag: &str,
    ) -> PersistenceResult<Option<RegistryManifest>> {
        let bindings = lock(&self.bindings, "manifest store")?;
        Ok(bindings
            .get(&(domain.to_string(), repository_id.to_string(), tag.to_string()))
            .cloned())
    }

    fn remove_tag_binding(
        &self,
        domain: &str,
        repository_id: &str,
        tag: &str,
    ) -> PersistenceResult<bool> {
        let mut bindings = lock(&self.bindings, "manifest store")?;
        Ok(bindings
            .remove(&(domain.to_string(), repository_id.to_string(), tag.to_string()))
            .is_some())
    }
}

#[derive(Default)]
pub struct InMemoryPipelineStore {
    pipelines: Mutex<HashMap<String, Pipeline>>,
}

impl InMemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pipeline: Pipeline) -> PersistenceResult<()> {
        let mut pipelines = lock(&self.pipelines, "pipeline store")?;
        pipelines.insert(pipeline.id.clone(), pipeline);
        Ok(())
    }
}

impl PipelineStore for InMemoryPipelineStore {
    fn get_pipeline(&self, pipeline_id: &str) -> PersistenceResult<Option<Pipeline>> {
        let pipelines = lock(&self.pipelines, "pipeline store")?;
        Ok(pipelines.get(pipeline_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, String>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn last_completed(&self, checkpoint_key: &str) -> PersistenceResult<Option<String>> {
        let checkpoints = lock(&self.checkpoints, "checkpoint store")?;
        Ok(checkpoints.get(checkpoint_key).cloned())
    }

    fn record_completed(
        &self,
        checkpoint_key: &str,
        component_id: &str,
    ) -> PersistenceResult<()> {
        let mut checkpoints = lock(&self.checkpoints, "checkpoint store")?;
        checkpoints.insert(checkpoint_key.to_string(), component_id.to_string());
        Ok(())
    }

    fn clear(&self, checkpoint_key: &str) -> PersistenceResult<()> {
        let mut checkpoints = lock(&self.checkpoints, "checkpoint store")?;
        checkpoints.remove(checkpoint_key);
        Ok(())
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> PersistenceResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| CoreError::internal(format!("{name} mutex poisoned")))
}
