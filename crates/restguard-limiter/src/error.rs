use restguard_core::CoreError;

/// Errors surfaced by the limiter's backing store.
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    /// The backing store is unreachable; the rule's fail mode decides the
    /// admission outcome.
    #[error("Limit store unavailable: {message}")]
    Unavailable { message: String },

    /// An internal limiter error occurred.
    #[error("Internal limiter error: {message}")]
    Internal { message: String },
}

impl LimiterError {
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<LimiterError> for CoreError {
    fn from(err: LimiterError) -> Self {
        match err {
            LimiterError::Unavailable { message } | LimiterError::Internal { message } => {
                CoreError::upstream_unavailable("limit-store", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restguard_core::ErrorCategory;

    #[test]
    fn test_conversion_to_core_error() {
        let core: CoreError = LimiterError::unavailable("refused").into();
        assert_eq!(core.category(), ErrorCategory::Upstream);
    }
}
