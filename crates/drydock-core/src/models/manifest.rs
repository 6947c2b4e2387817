use serde::{Deserialize, Serialize};

/// Binding of one tag in a repository to a manifest digest.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryManifest {
    pub domain: String,
    pub repository_id: String,
    pub tag: String,
    pub manifest_id: String,
}
