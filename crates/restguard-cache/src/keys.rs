//! Cache key addressing.
//!
//! Physical keys are composed as `{prefix}:g{generation}:{namespace}:{key}`.
//! The prefix partitions deployments sharing one L2, and the generation is a
//! per-namespace counter: bumping it makes every existing key in the
//! namespace unreachable, which is how namespace invalidation avoids
//! scanning L2.

use restguard_core::VersionToken;

/// A logical cache address: a namespace plus an entity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: String,
    pub key: String,
}

impl CacheKey {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Key variant bound to a specific entity version. A write produces a
    /// new version token, so stale cached copies of the old version are
    /// simply never addressed again.
    pub fn versioned(
        namespace: impl Into<String>,
        key: impl Into<String>,
        version: &VersionToken,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key: format!("{}@{}", key.into(), version),
        }
    }
}

/// Compose the physical key stored in L1/L2.
pub(crate) fn compose(prefix: &str, generation: u64, key: &CacheKey) -> String {
    format!("{prefix}:g{generation}:{}:{}", key.namespace, key.key)
}
