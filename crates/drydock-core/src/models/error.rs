use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    InvalidWorkItem,
    Serialization,
    RuntimeDecode,
    UnknownTaskKind,
    RepositoryNotFound,
    ManifestNotFound,
    PipelineNotFound,
    UnsupportedDestination,
    ComponentFailure,
    InvalidInput,
    StorageFailure,
    Timeout,
    Internal,
}

impl CoreErrorKind {
    /// Whether redelivering the same record can reasonably succeed.
    ///
    /// Missing entities, malformed records and configuration mistakes fail
    /// identically on every delivery, so they are fatal for the record.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::ComponentFailure | Self::StorageFailure | Self::Timeout | Self::Internal
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub kind: CoreErrorKind,
    pub domain: Option<String>,
    pub subject: Option<String>,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            domain: None,
            subject: None,
            message: message.into(),
        }
    }

    pub fn invalid_work_item(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::InvalidWorkItem, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Fills in the domain and subject unless the error already carries them.
    pub fn attribute(self, domain: &str, subject: &str) -> Self {
        Self {
            domain: self.domain.or_else(|| Some(domain.to_string())),
            subject: self.subject.or_else(|| Some(subject.to_string())),
            kind: self.kind,
            message: self.message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
