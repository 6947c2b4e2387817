use std::collections::HashMap;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::models::{CoreError, CoreErrorKind, DurableRecord};
use crate::orchestration::OrchestrationResult;
use crate::pipeline::{PipelineEngine, PipelineTaskFactory};
use crate::sync::RepoSyncTaskFactory;
use crate::tasks::Runnable;

pub trait TaskFactory: Send + Sync {
    fn kind(&self) -> &'static str;

    fn to_runnable(&self, record: &DurableRecord) -> OrchestrationResult<Box<dyn Runnable>>;
}

#[derive(Clone)]
pub struct TaskFactoryRegistry {
    factories: Arc<HashMap<&'static str, Arc<dyn TaskFactory>>>,
}

impl TaskFactoryRegistry {
    pub fn new(
        factories: impl IntoIterator<Item = Arc<dyn TaskFactory>>,
    ) -> OrchestrationResult<Self> {
        let mut mapped = HashMap::new();
        for factory in factories {
            let kind = factory.kind();
            if mapped.insert(kind, factory).is_some() {
                return Err(CoreError::new(
                    CoreErrorKind::InvalidInput,
                    format!("duplicate task factory registration for kind '{kind}'"),
                ));
            }
        }

        Ok(Self {
            factories: Arc::new(mapped),
        })
    }

    /// Registers the pipeline and repository-sync factories.
    pub fn standard(
        context: &EngineContext,
        engine: Arc<PipelineEngine>,
    ) -> OrchestrationResult<Self> {
        Self::new([
            Arc::new(PipelineTaskFactory::new(engine, context.checkpoints.clone()))
                as Arc<dyn TaskFactory>,
            Arc::new(RepoSyncTaskFactory::new(context.repository_sync())),
        ])
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = self.factories.keys().copied().collect::<Vec<_>>();
        kinds.sort_unstable();
        kinds
    }

    pub fn rehydrate(&self, record: &DurableRecord) -> OrchestrationResult<Box<dyn Runnable>> {
        let factory = self.factories.get(record.kind.as_str()).ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::UnknownTaskKind,
                format!("no task factory is registered for kind '{}'", record.kind),
            )
            .with_subject(record.subject_id.clone())
        });

        let runnable = factory.and_then(|factory| factory.to_runnable(record));
        if let Err(error) = &runnable {
            tracing::error!(
                kind = %record.kind,
                subject = %record.subject_id,
                exclusion_keys = ?record.exclusion_keys,
                error_kind = ?error.kind,
                message = %error.message,
                "failed to rehydrate durable record"
            );
        }
        runnable
    }
}
