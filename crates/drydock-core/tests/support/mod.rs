#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use drydock_core::EngineContext;
use drydock_core::models::{
    ComponentKind, ComponentSpec, CopyToRepository, CoreError, CoreErrorKind, Notify, Pipeline,
    PipelineComponent, RegistryManifest, Repository, Scan,
};
use drydock_core::orchestration::OrchestrationResult;
use drydock_core::persistence::{
    InMemoryCheckpointStore, InMemoryManifestStore, InMemoryPipelineStore,
    InMemoryRepositoryStore,
};
use drydock_core::pipeline::{ComponentHandler, ComponentInvocation};
use drydock_core::registry::{CopyRequest, CrossRepositoryCopy, RegistryResult};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CopiedImage {
    pub source: String,
    pub destination: String,
    pub reference: String,
    pub tags: Vec<String>,
}

#[derive(Default)]
pub struct RecordingCopier {
    copies: Mutex<Vec<CopiedImage>>,
    failing: Mutex<bool>,
}

impl RecordingCopier {
    pub fn copies(&self) -> Vec<CopiedImage> {
        self.copies.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

impl CrossRepositoryCopy for RecordingCopier {
    fn copy(&self, request: &CopyRequest<'_>) -> RegistryResult<()> {
        let mut failing = self.failing.lock().unwrap();
        if *failing {
            *failing = false;
            return Err(CoreError::new(
                CoreErrorKind::ComponentFailure,
                "registry returned 503",
            ));
        }

        self.copies.lock().unwrap().push(CopiedImage {
            source: request.source.id.clone(),
            destination: request.destination.id.clone(),
            reference: request.source_reference.to_string(),
            tags: request.destination_tags.to_vec(),
        });
        Ok(())
    }
}

/// Handler for scan or notify components that records what it ran.
pub struct RecordingHandler {
    kind: ComponentKind,
    ran: Arc<Mutex<Vec<String>>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingHandler {
    pub fn new(kind: ComponentKind, ran: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            kind,
            ran,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_on(&self, component_id: &str) {
        self.failing.lock().unwrap().insert(component_id.to_string());
    }

    pub fn recover(&self, component_id: &str) {
        self.failing.lock().unwrap().remove(component_id);
    }
}

impl ComponentHandler for RecordingHandler {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn execute(&self, invocation: &ComponentInvocation<'_>) -> OrchestrationResult<()> {
        let id = invocation.component.id.clone();
        if self.failing.lock().unwrap().contains(&id) {
            return Err(CoreError::new(
                CoreErrorKind::ComponentFailure,
                format!("{} unavailable", self.kind.as_str()),
            ));
        }
        self.ran
            .lock()
            .unwrap()
            .push(format!("{id}@{}", invocation.reference));
        Ok(())
    }
}

pub struct Fixture {
    pub repositories: Arc<InMemoryRepositoryStore>,
    pub manifests: Arc<InMemoryManifestStore>,
    pub pipelines: Arc<InMemoryPipelineStore>,
    pub copier: Arc<RecordingCopier>,
    pub checkpoints: Arc<InMemoryCheckpointStore>,
}

impl Fixture {
    /// Domain `acme` with hosted repositories `r1`, `staging`, `prod` and a
    /// remote ECR mirror `mirror`.
    pub fn new() -> Self {
        let repositories = InMemoryRepositoryStore::with_repositories([
            Repository::hosted("acme", "r1", "app"),
            Repository::hosted("acme", "staging", "app-staging"),
            Repository::hosted("acme", "prod", "app-prod"),
            Repository::remote(
                "acme",
                "mirror",
                "app-mirror",
                drydock_core::models::RegistryProvider::Ecr,
            ),
        ]);

        Self {
            repositories: Arc::new(repositories),
            manifests: Arc::new(InMemoryManifestStore::new()),
            pipelines: Arc::new(InMemoryPipelineStore::new()),
            copier: Arc::new(RecordingCopier::default()),
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
        }
    }

    pub fn context(&self) -> EngineContext {
        EngineContext {
            repositories: self.repositories.clone(),
            manifests: self.manifests.clone(),
            pipelines: self.pipelines.clone(),
            copier: self.copier.clone(),
            checkpoints: self.checkpoints.clone(),
        }
    }

    pub fn bind(&self, repository_id: &str, tag: &str, manifest_id: &str) {
        self.manifests
            .bind(RegistryManifest {
                domain: "acme".to_string(),
                repository_id: repository_id.to_string(),
                tag: tag.to_string(),
                manifest_id: manifest_id.to_string(),
            })
            .unwrap();
    }
}

pub fn copy_component(id: &str, destination: &str, tag: Option<&str>) -> PipelineComponent {
    PipelineComponent::new(
        id,
        ComponentSpec::CopyToRepository(CopyToRepository {
            destination_repository_id: destination.to_string(),
            tag: tag.map(str::to_string),
        }),
    )
}

pub fn scan_component(id: &str) -> PipelineComponent {
    PipelineComponent::new(
        id,
        ComponentSpec::Scan(Scan {
            scanner: "clair".to_string(),
        }),
    )
}

pub fn notify_component(id: &str) -> PipelineComponent {
    PipelineComponent::new(
        id,
        ComponentSpec::Notify(Notify {
            target: "ops".to_string(),
        }),
    )
}

pub fn pipeline(id: &str, components: Vec<PipelineComponent>) -> Pipeline {
    Pipeline {
        id: id.to_string(),
        domain: "acme".to_string(),
        name: format!("{id} pipeline"),
        components,
    }
}
