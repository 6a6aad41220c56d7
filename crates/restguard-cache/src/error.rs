//! Cache errors.
//!
//! The compute variant wraps its source in an `Arc` so a single failed
//! recomputation can be fanned out to every caller waiting on the same
//! single-flight slot.

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The caller-supplied compute closure failed. Nothing was cached.
    #[error("Cache recomputation failed: {0}")]
    Compute(Arc<anyhow::Error>),

    /// The in-flight computation was abandoned before producing a result
    /// (the computing task panicked or was torn down with the runtime).
    #[error("Cache recomputation abandoned before completion")]
    Abandoned,

    /// Invalid TTL or key configuration.
    #[error("Invalid cache configuration: {0}")]
    Configuration(String),
}

impl CacheError {
    pub fn compute(source: anyhow::Error) -> Self {
        Self::Compute(Arc::new(source))
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
