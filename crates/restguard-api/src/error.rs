//! API errors mapped to HTTP responses.
//!
//! Every user-visible failure carries a machine-readable kind and, when the
//! request id middleware ran, a correlation identifier. Internal causes are
//! logged but never serialized into the response body.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use restguard_cache::CacheError;
use restguard_core::{CoreError, ErrorCategory};
use restguard_storage::StorageError;

/// Machine-readable error classification exposed in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Throttled,
    UpstreamUnavailable,
    Internal,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    retry_after: Option<Duration>,
    correlation_id: Option<String>,
}

impl ApiError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
            correlation_id: None,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }

    pub fn throttled(retry_after: Duration) -> Self {
        let mut err = Self::new(ErrorKind::Throttled, "Request rate limit exceeded");
        err.retry_after = Some(retry_after);
        err
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, msg)
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Internal, "Internal error")
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Throttled => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    kind: ErrorKind,
    message: &'a str,
    #[serde(rename = "correlationId", skip_serializing_if = "Option::is_none")]
    correlation_id: Option<&'a str>,
    #[serde(rename = "retryAfterSecs", skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

/// Whole seconds, rounded up, never zero. Matches the resolution of the
/// `Retry-After` header.
fn retry_after_secs(d: Duration) -> u64 {
    let mut secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs += 1;
    }
    secs.max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = ErrorEnvelope {
            kind: self.kind,
            message: &self.message,
            correlation_id: self.correlation_id.as_deref(),
            retry_after_secs: self.retry_after.map(retry_after_secs),
        };
        let body = serde_json::to_vec(&envelope).unwrap_or_else(|_| b"{}".to_vec());

        let mut builder = axum::http::Response::builder().status(status).header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(retry_after) = self.retry_after {
            builder = builder.header(header::RETRY_AFTER, retry_after_secs(retry_after));
        }
        builder
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| {
                axum::http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(axum::body::Body::from("{}"))
                    .expect("build fallback response")
            })
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err.category() {
            ErrorCategory::Throttled => match err {
                CoreError::Throttled { retry_after } => Self::throttled(retry_after),
                _ => Self::throttled(Duration::from_secs(1)),
            },
            ErrorCategory::Conflict => Self::conflict(err.to_string()),
            ErrorCategory::Validation => Self::validation(err.to_string()),
            ErrorCategory::NotFound => Self::not_found(err.to_string()),
            ErrorCategory::Upstream => {
                tracing::error!(error = %err, "upstream dependency failure");
                Self::unavailable("A required upstream dependency is unavailable")
            }
            ErrorCategory::Configuration | ErrorCategory::Serialization => {
                tracing::error!(error = %err, "internal failure");
                Self::internal()
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::from(CoreError::from(err))
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Compute(_) | CacheError::Abandoned => {
                tracing::error!(error = %err, "cache recomputation failure");
                Self::unavailable("Resource computation failed")
            }
            CacheError::Configuration(_) => {
                tracing::error!(error = %err, "cache misconfiguration");
                Self::internal()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_per_kind() {
        assert_eq!(
            ApiError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::throttled(Duration::from_secs(5)).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::unavailable("x").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::internal().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_throttled_response_carries_retry_after_header() {
        let resp = ApiError::throttled(Duration::from_millis(1500)).into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        // 1.5s rounds up to the next whole second.
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "2");
    }

    #[test]
    fn test_retry_after_never_zero() {
        assert_eq!(retry_after_secs(Duration::from_millis(10)), 1);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(30)), 30);
    }

    #[test]
    fn test_conflict_maps_from_core_error() {
        let err = CoreError::version_conflict("1", "2");
        let api: ApiError = err.into();
        assert_eq!(api.kind(), ErrorKind::Conflict);
        assert_eq!(api.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_upstream_error_hides_internal_cause() {
        let err = CoreError::upstream_unavailable("redis", "connection refused to 10.0.0.3:6379");
        let api: ApiError = err.into();
        let resp = api.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_envelope_shape() {
        let err = ApiError::validation("take must be > 0").with_correlation_id("abc-123");
        let envelope = ErrorEnvelope {
            kind: err.kind,
            message: &err.message,
            correlation_id: err.correlation_id.as_deref(),
            retry_after_secs: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["message"], "take must be > 0");
        assert_eq!(json["correlationId"], "abc-123");
    }
}
