pub mod component;
pub mod engine;
pub mod task;

pub use component::{
    ComponentHandler, ComponentHandlers, ComponentInvocation, CopyToRepositoryHandler,
};
pub use engine::{
    PipelineEngine, PipelineProgress, PipelineRunReport, PipelineRunRequest, components_to_run,
    resolve_reference, start_index,
};
pub use task::{PipelineTask, PipelineTaskFactory};
