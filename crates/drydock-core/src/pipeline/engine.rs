use std::sync::Arc;

use crate::context::EngineContext;
use crate::models::{ComponentSpec, CoreError, CoreErrorKind, Pipeline, PipelineComponent};
use crate::orchestration::OrchestrationResult;
use crate::persistence::{ManifestStore, PipelineStore, RepositoryStore};
use crate::pipeline::{
    ComponentHandler, ComponentHandlers, ComponentInvocation, CopyToRepositoryHandler,
};
use crate::sync::resolve_repository;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PipelineRunRequest {
    pub domain: String,
    pub pipeline_id: String,
    pub repository_id: String,
    pub tag: Option<String>,
    pub manifest_id: Option<String>,
    pub start_component_id: Option<String>,
    /// Last component a previous delivery of the same work completed.
    pub resume_after_component_id: Option<String>,
    pub destination_tag: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineRunReport {
    pub pipeline_id: String,
    pub reference: String,
    pub executed: Vec<String>,
}

/// Receives the id of every component as soon as it has completed.
pub trait PipelineProgress {
    fn component_completed(&self, component_id: &str) -> OrchestrationResult<()>;
}

pub struct PipelineEngine {
    pipelines: Arc<dyn PipelineStore>,
    repositories: Arc<dyn RepositoryStore>,
    manifests: Arc<dyn ManifestStore>,
    handlers: ComponentHandlers,
}

impl PipelineEngine {
    /// Builds an engine with the built-in copy-to-repository handler plus
    /// `handlers` for the remaining component kinds.
    pub fn new(
        context: &EngineContext,
        handlers: impl IntoIterator<Item = Arc<dyn ComponentHandler>>,
    ) -> OrchestrationResult<Self> {
        let mut registered = ComponentHandlers::new([Arc::new(CopyToRepositoryHandler::new(
            context.repositories.clone(),
            context.copier.clone(),
        )) as Arc<dyn ComponentHandler>])?;
        for handler in handlers {
            registered.register(handler)?;
        }

        Ok(Self::with_handlers(
            context.pipelines.clone(),
            context.repositories.clone(),
            context.manifests.clone(),
            registered,
        ))
    }

    pub fn with_handlers(
        pipelines: Arc<dyn PipelineStore>,
        repositories: Arc<dyn RepositoryStore>,
        manifests: Arc<dyn ManifestStore>,
        handlers: ComponentHandlers,
    ) -> Self {
        Self {
            pipelines,
            repositories,
            manifests,
            handlers,
        }
    }

    pub fn run(
        &self,
        request: &PipelineRunRequest,
        progress: Option<&dyn PipelineProgress>,
    ) -> OrchestrationResult<PipelineRunReport> {
        let domain = request.domain.as_str();
        let attribute = |error: CoreError| error.attribute(domain, &request.pipeline_id);

        let pipeline = self
            .pipelines
            .get_pipeline(&request.pipeline_id)
            .map_err(attribute)?
            .ok_or_else(|| {
                attribute(CoreError::new(
                    CoreErrorKind::PipelineNotFound,
                    format!("failed to find pipeline '{}'", request.pipeline_id),
                ))
            })?;
        let repository = resolve_repository(
            self.repositories.as_ref(),
            domain,
            &request.repository_id,
            "target",
        )
        .map_err(attribute)?;
        let reference = resolve_reference(
            self.manifests.as_ref(),
            domain,
            &request.repository_id,
            request.tag.as_deref(),
            request.manifest_id.as_deref(),
        )
        .map_err(attribute)?;

        let start_index = start_index(
            &pipeline,
            request.start_component_id.as_deref(),
            request.resume_after_component_id.as_deref(),
        );
        let components = components_to_run(
            &pipeline,
            start_index,
            request.destination_tag.as_deref(),
        );

        tracing::info!(
            domain,
            pipeline_id = %pipeline.id,
            repository_id = %repository.id,
            reference = %reference,
            start_index,
            components = components.len(),
            "running pipeline"
        );

        let mut executed = Vec::with_capacity(components.len());
        for component in &components {
            let invocation = ComponentInvocation {
                domain,
                pipeline_id: &pipeline.id,
                repository: &repository,
                reference: &reference,
                tag: request.tag.as_deref(),
                manifest_id: request.manifest_id.as_deref(),
                component,
            };

            if let Err(error) = self.execute_component(&invocation) {
                tracing::error!(
                            domain,
                    pipeline_id = %pipeline.id,
                    component_id = %component.id,
                    component_kind = component.kind().as_str(),
                    completed = executed.len(),
                    kind = ?error.kind,
                    message = %error.message,
                    "pipeline component failed; aborting remaining components"
                );
                return Err(attribute(error));
            }

            tracing::debug!(
                pipeline_id = %pipeline.id,
                component_id = %component.id,
                "pipeline component completed"
            );
            if let Some(progress) = progress {
                progress
                    .component_completed(&component.id)
                    .map_err(attribute)?;
            }
            executed.push(component.id.clone());
        }

        Ok(PipelineRunReport {
            pipeline_id: pipeline.id,
            reference,
            executed,
        })
    }

    fn execute_component(&self, invocation: &ComponentInvocation<'_>) -> OrchestrationResult<()> {
        let component = invocation.component;
        let handler = self.handlers.get(component.kind()).ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::ComponentFailure,
                format!(
                    "no handler is registered for component '{}' of kind '{}'",
                    component.id,
                    component.kind().as_str()
                ),
            )
        })?;

        handler.execute(invocation).map_err(|error| CoreError {
            message: format!("component '{}' failed: {}", component.id, error.message),
            ..error
        })
    }
}

/// Picks the image reference a run should process.
///
/// When the work item names a manifest and the tag has since moved to a
/// different one, the manifest is processed rather than whatever the tag
/// points at now. A tag with no binding is processed as given.
pub fn resolve_reference(
    manifests: &dyn ManifestStore,
    domain: &str,
    repository_id: &str,
    tag: Option<&str>,
    manifest_id: Option<&str>,
) -> OrchestrationResult<String> {
    match (tag, manifest_id) {
        (Some(tag), Some(manifest_id)) => {
            let bound = manifests.get_manifest_by_tag(domain, repository_id, tag)?;
            match bound {
                Some(bound) if bound.manifest_id != manifest_id => Ok(manifest_id.to_string()),
                _ => Ok(tag.to_string()),
            }
        }
        (Some(tag), None) => Ok(tag.to_string()),
        (None, Some(manifest_id)) => Ok(manifest_id.to_string()),
        (None, None) => Err(CoreError::invalid_work_item(
            "a pipeline run needs a tag or a manifest id",
        )),
    }
}

/// Index of the first component to execute.
///
/// An unknown start component reruns the whole pipeline. A checkpoint only
/// ever moves the start forward, so components a previous delivery already
/// completed are not repeated.
pub fn start_index(
    pipeline: &Pipeline,
    start_component_id: Option<&str>,
    resume_after_component_id: Option<&str>,
) -> usize {
    let explicit = start_component_id
        .and_then(|id| pipeline.component_index(id))
        .unwrap_or(0);
    let resumed = resume_after_component_id
        .and_then(|id| pipeline.component_index(id))
        .map(|index| index + 1)
        .unwrap_or(0);
    explicit.max(resumed)
}

/// Clones the components from `start_index` on, applying the destination tag
/// override to the first one when it copies to a repository. The stored
/// pipeline is never modified.
pub fn components_to_run(
    pipeline: &Pipeline,
    start_index: usize,
    destination_tag: Option<&str>,
) -> Vec<PipelineComponent> {
    let mut components = pipeline
        .components
        .get(start_index..)
        .map(<[PipelineComponent]>::to_vec)
        .unwrap_or_default();

    if let Some(destination_tag) = destination_tag
        && let Some(first) = components.first_mut()
        && let ComponentSpec::CopyToRepository(copy) = &mut first.spec
    {
        copy.tag = Some(destination_tag.to_string());
    }

    components
}
