use crate::models::{CoreError, Repository};

pub type RegistryResult<T> = Result<T, CoreError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CopyRequest<'a> {
    pub source: &'a Repository,
    pub destination: &'a Repository,
    /// Tag or manifest digest in the source repository.
    pub source_reference: &'a str,
    pub destination_tags: &'a [String],
}

/// Copies an image between repositories, binding every destination tag.
///
/// A failed call leaves the destination in an unknown partial state. Binding
/// a tag to the same manifest twice is harmless, so callers retry the whole
/// request.
pub trait CrossRepositoryCopy: Send + Sync {
    fn copy(&self, request: &CopyRequest<'_>) -> RegistryResult<()>;
}
