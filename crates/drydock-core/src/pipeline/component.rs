use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{
    ComponentKind, ComponentSpec, CoreError, CoreErrorKind, PipelineComponent, Repository,
};
use crate::orchestration::OrchestrationResult;
use crate::persistence::RepositoryStore;
use crate::registry::{CopyRequest, CrossRepositoryCopy};
use crate::sync::{ensure_local_write_target, resolve_repository};

/// Everything a component needs to process one image.
#[derive(Clone, Copy, Debug)]
pub struct ComponentInvocation<'a> {
    pub domain: &'a str,
    pub pipeline_id: &'a str,
    pub repository: &'a Repository,
    /// Tag or manifest id that this run processes.
    pub reference: &'a str,
    pub tag: Option<&'a str>,
    pub manifest_id: Option<&'a str>,
    pub component: &'a PipelineComponent,
}

pub trait ComponentHandler: Send + Sync {
    fn kind(&self) -> ComponentKind;

    fn execute(&self, invocation: &ComponentInvocation<'_>) -> OrchestrationResult<()>;
}

#[derive(Clone, Default)]
pub struct ComponentHandlers {
    handlers: HashMap<ComponentKind, Arc<dyn ComponentHandler>>,
}

impl ComponentHandlers {
    pub fn new(
        handlers: impl IntoIterator<Item = Arc<dyn ComponentHandler>>,
    ) -> OrchestrationResult<Self> {
        let mut registered = Self::default();
        for handler in handlers {
            registered.register(handler)?;
        }
        Ok(registered)
    }

    pub fn register(&mut self, handler: Arc<dyn ComponentHandler>) -> OrchestrationResult<()> {
        let kind = handler.kind();
        if self.handlers.contains_key(&kind) {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!(
                    "duplicate component handler registration for kind '{}'",
                    kind.as_str()
                ),
            ));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn get(&self, kind: ComponentKind) -> Option<&Arc<dyn ComponentHandler>> {
        self.handlers.get(&kind)
    }
}

/// Copies the processed image into another hosted repository.
pub struct CopyToRepositoryHandler {
    repositories: Arc<dyn RepositoryStore>,
    copier: Arc<dyn CrossRepositoryCopy>,
}

impl CopyToRepositoryHandler {
    pub fn new(
        repositories: Arc<dyn RepositoryStore>,
        copier: Arc<dyn CrossRepositoryCopy>,
    ) -> Self {
        Self {
            repositories,
            copier,
        }
    }
}

impl ComponentHandler for CopyToRepositoryHandler {
    fn kind(&self) -> ComponentKind {
        ComponentKind::CopyToRepository
    }

    fn execute(&self, invocation: &ComponentInvocation<'_>) -> OrchestrationResult<()> {
        let ComponentSpec::CopyToRepository(copy) = &invocation.component.spec else {
            return Err(CoreError::internal(format!(
                "component '{}' is not a copy-to-repository step",
                invocation.component.id
            )));
        };

        let destination = resolve_repository(
            self.repositories.as_ref(),
            invocation.domain,
            &copy.destination_repository_id,
            "destination",
        )?;
        ensure_local_write_target(&destination)?;

        let tag = copy
            .tag
            .as_deref()
            .or(invocation.tag)
            .ok_or_else(|| {
                CoreError::invalid_work_item(format!(
                    "component '{}' has no destination tag and the run has no source tag",
                    invocation.component.id
                ))
            })?;
        let destination_tags = [tag.to_string()];

        self.copier.copy(&CopyRequest {
            source: invocation.repository,
            destination: &destination,
            source_reference: invocation.reference,
            destination_tags: &destination_tags,
        })
    }
}
