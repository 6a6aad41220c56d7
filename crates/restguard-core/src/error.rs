use std::time::Duration;
use thiserror::Error;

/// Core error taxonomy for RestGuard operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Request throttled, retry after {retry_after:?}")]
    Throttled { retry_after: Duration },

    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: String, actual: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Upstream unavailable: {dependency}: {message}")]
    UpstreamUnavailable { dependency: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new Throttled error.
    pub fn throttled(retry_after: Duration) -> Self {
        Self::Throttled { retry_after }
    }

    /// Create a new VersionConflict error.
    pub fn version_conflict(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::VersionConflict {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a new Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new NotFound error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a new UpstreamUnavailable error.
    pub fn upstream_unavailable(
        dependency: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::UpstreamUnavailable {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    /// Create a new Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error is a client error (4xx category).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Throttled { .. }
                | Self::VersionConflict { .. }
                | Self::Validation(_)
                | Self::NotFound { .. }
        )
    }

    /// Check if this error is a server error (5xx category).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Check if the caller can recover by retrying (possibly after a re-read
    /// or a pause). Validation errors require client correction first.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Throttled { .. } | Self::VersionConflict { .. } | Self::UpstreamUnavailable { .. }
        )
    }

    /// Get error category for logging/monitoring.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Throttled { .. } => ErrorCategory::Throttled,
            Self::VersionConflict { .. } => ErrorCategory::Conflict,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::UpstreamUnavailable { .. } => ErrorCategory::Upstream,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::JsonError(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error categories for monitoring and classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Throttled,
    Conflict,
    Validation,
    NotFound,
    Upstream,
    Configuration,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Throttled => write!(f, "throttled"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Upstream => write!(f, "upstream"),
            Self::Configuration => write!(f, "configuration"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Convenience result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
