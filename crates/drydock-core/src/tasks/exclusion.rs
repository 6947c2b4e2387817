use std::collections::BTreeSet;

use crate::models::CoreError;
use crate::orchestration::OrchestrationResult;

/// Derives the mutual-exclusion key for writes to `tags` of a repository.
///
/// Tags are de-duplicated and sorted before joining so that requests naming
/// the same tag set in any order collide on the same key.
pub fn exclusion_key<I, S>(domain: &str, repository_id: &str, tags: I) -> OrchestrationResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tags = tags
        .into_iter()
        .map(|tag| tag.as_ref().to_string())
        .collect::<BTreeSet<_>>();

    if tags.is_empty() {
        return Err(CoreError::invalid_work_item(format!(
            "at least one tag is required to lock repository '{repository_id}'"
        ))
        .with_domain(domain)
        .with_subject(repository_id));
    }

    let joined = tags.into_iter().collect::<Vec<_>>().join(":");
    Ok(format!("{domain}/{repository_id}/{joined}"))
}
