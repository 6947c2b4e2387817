use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Storable form of a work item.
///
/// The queue collaborator persists and redelivers these; it must hold every
/// entry of `exclusion_keys` before handing the record to a worker.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableRecord {
    pub kind: String,
    pub subject_id: String,
    pub exclusion_keys: BTreeSet<String>,
    pub payload: Vec<u8>,
}

impl DurableRecord {
    pub fn overlaps(&self, other: &DurableRecord) -> bool {
        !self.exclusion_keys.is_disjoint(&other.exclusion_keys)
    }
}
