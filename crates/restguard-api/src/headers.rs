//! Precondition and version header plumbing.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::ApiError;
use restguard_core::{ConcurrencyEnvelope, VersionToken, parse_etag};

/// A parsed `If-Match` precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// `If-Match: *` — the write requires only that the resource exists.
    Any,
    /// A previously issued version identifier.
    Version(VersionToken),
}

/// Parse the `If-Match` header. Absence means unconditional write and yields
/// `None`; a malformed value is a client error, not a silent fallthrough to
/// last-write-wins.
pub fn parse_if_match(headers: &HeaderMap) -> Result<Option<Precondition>, ApiError> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::validation("If-Match header is not valid ASCII"))?
        .trim();
    if raw == "*" {
        return Ok(Some(Precondition::Any));
    }
    match parse_etag(raw) {
        Some(token) => Ok(Some(Precondition::Version(token))),
        None => Err(ApiError::validation(format!(
            "If-Match header is not a valid entity tag: {raw}"
        ))),
    }
}

/// Check `If-None-Match` against the current version. Returns true when the
/// client's cached copy is still current (respond 304 Not Modified).
pub fn check_if_none_match(headers: &HeaderMap, current: &VersionToken) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };
    raw.split(',').any(|part| {
        let part = part.trim();
        part == "*" || parse_etag(part).as_ref() == Some(current)
    })
}

/// A JSON response wrapper carrying status and extra headers.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Attach `ETag` and `Last-Modified` from a concurrency envelope.
    #[must_use]
    pub fn with_envelope(mut self, envelope: &ConcurrencyEnvelope) -> Self {
        if let Ok(val) = HeaderValue::from_str(&envelope.etag()) {
            self.headers.push((header::ETAG, val));
        }
        if let Ok(val) = HeaderValue::from_str(&envelope.last_modified_http()) {
            self.headers.push((header::LAST_MODIFIED, val));
        }
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec(&self.value) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "response serialization failed");
                return ApiError::internal().into_response();
            }
        };
        let mut builder = axum::http::Response::builder().status(self.status).header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

/// A 304 Not Modified response that still advertises the current version.
pub fn not_modified(envelope: &ConcurrencyEnvelope) -> Response {
    let mut builder = axum::http::Response::builder().status(StatusCode::NOT_MODIFIED);
    if let Ok(val) = HeaderValue::from_str(&envelope.etag()) {
        builder = builder.header(header::ETAG, val);
    }
    builder
        .body(axum::body::Body::empty())
        .unwrap_or_else(|_| StatusCode::NOT_MODIFIED.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use restguard_core::now_utc;

    fn envelope(version: &str) -> ConcurrencyEnvelope {
        ConcurrencyEnvelope {
            version: VersionToken::new(version),
            last_modified: now_utc(),
        }
    }

    #[test]
    fn test_if_match_absent_is_unconditional() {
        assert_eq!(parse_if_match(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn test_if_match_weak_etag() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, HeaderValue::from_static("W/\"7\""));
        assert_eq!(
            parse_if_match(&headers).unwrap(),
            Some(Precondition::Version(VersionToken::new("7")))
        );
    }

    #[test]
    fn test_if_match_star() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, HeaderValue::from_static("*"));
        assert_eq!(parse_if_match(&headers).unwrap(), Some(Precondition::Any));
    }

    #[test]
    fn test_if_match_malformed_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, HeaderValue::from_static("not-an-etag"));
        assert!(parse_if_match(&headers).is_err());
    }

    #[test]
    fn test_if_none_match_current_version() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("W/\"7\""));
        assert!(check_if_none_match(&headers, &VersionToken::new("7")));
        assert!(!check_if_none_match(&headers, &VersionToken::new("8")));
    }

    #[test]
    fn test_if_none_match_list() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_static("W/\"5\", W/\"7\""),
        );
        assert!(check_if_none_match(&headers, &VersionToken::new("7")));
    }

    #[test]
    fn test_response_carries_version_headers() {
        let resp = ApiResponse::ok(serde_json::json!({"a": 1}))
            .with_envelope(&envelope("7"))
            .into_response();
        assert_eq!(
            resp.headers().get(header::ETAG).unwrap(),
            &HeaderValue::from_static("W/\"7\"")
        );
        assert!(resp.headers().contains_key(header::LAST_MODIFIED));
    }

    #[test]
    fn test_not_modified_keeps_etag() {
        let resp = not_modified(&envelope("3"));
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(
            resp.headers().get(header::ETAG).unwrap(),
            &HeaderValue::from_static("W/\"3\"")
        );
    }
}
