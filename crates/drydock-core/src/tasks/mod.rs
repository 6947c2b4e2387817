pub mod exclusion;
pub mod factory;

pub use exclusion::exclusion_key;
pub use factory::{TaskFactory, TaskFactoryRegistry};

use std::collections::BTreeSet;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::{CoreError, CoreErrorKind, DurableRecord};
use crate::orchestration::OrchestrationResult;

/// A typed, immutable unit of deferred work that can round-trip through a
/// [`DurableRecord`].
pub trait WorkItem: Serialize + DeserializeOwned + Sized {
    /// Record kind used to find the factory that rehydrates this item.
    const KIND: &'static str;

    fn domain(&self) -> &str;

    fn subject_id(&self) -> &str;

    fn validate(&self) -> OrchestrationResult<()>;

    fn exclusion_keys(&self) -> OrchestrationResult<BTreeSet<String>>;

    fn to_durable_record(&self) -> OrchestrationResult<DurableRecord> {
        self.validate()?;
        let exclusion_keys = self.exclusion_keys()?;
        let payload = serde_json::to_vec(self).map_err(|error| {
            CoreError::new(
                CoreErrorKind::Serialization,
                format!("failed to encode '{}' payload: {error}", Self::KIND),
            )
            .attribute(self.domain(), self.subject_id())
        })?;

        Ok(DurableRecord {
            kind: Self::KIND.to_string(),
            subject_id: self.subject_id().to_string(),
            exclusion_keys,
            payload,
        })
    }

    fn from_durable_record(record: &DurableRecord) -> OrchestrationResult<Self> {
        if record.kind != Self::KIND {
            return Err(CoreError::new(
                CoreErrorKind::RuntimeDecode,
                format!(
                    "record of kind '{}' cannot be decoded as '{}'",
                    record.kind,
                    Self::KIND
                ),
            )
            .with_subject(record.subject_id.clone()));
        }

        let item: Self = serde_json::from_slice(&record.payload).map_err(|error| {
            CoreError::new(
                CoreErrorKind::RuntimeDecode,
                format!("failed to decode '{}' payload: {error}", Self::KIND),
            )
            .with_subject(record.subject_id.clone())
        })?;
        item.validate()?;
        Ok(item)
    }
}

/// A rehydrated work item bound to the collaborators it needs.
pub trait Runnable: Send {
    fn run(self: Box<Self>) -> OrchestrationResult<()>;
}

pub(crate) fn require_non_empty(
    value: &str,
    field: &str,
    domain: &str,
    subject: &str,
) -> OrchestrationResult<()> {
    if value.trim().is_empty() {
        return Err(
            CoreError::invalid_work_item(format!("missing field '{field}'"))
                .attribute(domain, subject),
        );
    }
    Ok(())
}
