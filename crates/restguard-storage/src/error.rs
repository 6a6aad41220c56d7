//! Error types for the storage collaborator interfaces.

use restguard_core::CoreError;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record was not found.
    #[error("Record not found: {key}")]
    NotFound {
        /// The key of the record that was not found.
        key: String,
    },

    /// A version conflict occurred during a conditional write.
    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// The version the caller expected.
        expected: String,
        /// The version actually stored.
        actual: String,
    },

    /// The record data is invalid.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Description of why the record is invalid.
        message: String,
    },

    /// The backing store is unreachable.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the connectivity failure.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::VersionConflict {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `InvalidRecord` error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error indicates a connectivity problem rather than a
    /// logical failure.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => CoreError::not_found(key),
            StorageError::VersionConflict { expected, actual } => {
                CoreError::version_conflict(expected, actual)
            }
            StorageError::InvalidRecord { message } => CoreError::validation(message),
            StorageError::Unavailable { message } => {
                CoreError::upstream_unavailable("storage", message)
            }
            StorageError::Internal { message } => {
                CoreError::upstream_unavailable("storage", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restguard_core::ErrorCategory;

    #[test]
    fn test_error_messages() {
        let err = StorageError::not_found("items/1");
        assert_eq!(err.to_string(), "Record not found: items/1");

        let err = StorageError::version_conflict("2", "3");
        assert_eq!(err.to_string(), "Version conflict: expected 2, found 3");
    }

    #[test]
    fn test_unavailable_predicate() {
        assert!(StorageError::unavailable("refused").is_unavailable());
        assert!(!StorageError::not_found("x").is_unavailable());
    }

    #[test]
    fn test_conversion_to_core_error() {
        let core: CoreError = StorageError::version_conflict("2", "3").into();
        assert_eq!(core.category(), ErrorCategory::Conflict);

        let core: CoreError = StorageError::unavailable("down").into();
        assert_eq!(core.category(), ErrorCategory::Upstream);

        let core: CoreError = StorageError::not_found("items/1").into();
        assert_eq!(core.category(), ErrorCategory::NotFound);
    }
}
