pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod record;
pub mod repository;

pub use error::{CoreError, CoreErrorKind};
pub use manifest::RegistryManifest;
pub use pipeline::{
    ComponentKind, ComponentSpec, CopyToRepository, Notify, Pipeline, PipelineComponent, Scan,
};
pub use record::DurableRecord;
pub use repository::{RegistryProvider, Repository};
