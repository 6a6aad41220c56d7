//! Request-scoped middleware: correlation ids and admission control.

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::body::Body;
use uuid::Uuid;

use crate::error::ApiError;
use restguard_limiter::{Decision, RateLimiter, RequestKey};

/// The correlation identifier for one request, echoed in error envelopes.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the caller identity as resolved by the fronting proxy or
/// auth layer. Used only for rate-limit key derivation.
pub const USER_HEADER: &str = "x-api-user";

// Middleware that ensures each request has an X-Request-Id and mirrors it on
// the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    // If the incoming request already has a request-id, preserve it;
    // otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());

    let correlation = CorrelationId(
        req_id_value
            .to_str()
            .unwrap_or("invalid-request-id")
            .to_string(),
    );
    req.extensions_mut().insert(correlation);
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

/// State for the rate-limit middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

/// Admission control. Runs before any handler work; a denied request costs
/// the caller nothing but the 429 round-trip.
pub async fn rate_limit(
    State(state): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = derive_request_key(&req);

    match state.limiter.admit(&key, 1).await {
        Decision::Allow => next.run(req).await,
        Decision::Deny { retry_after } => {
            tracing::debug!(
                path = %req.uri().path(),
                retry_after_secs = retry_after.as_secs(),
                "request throttled"
            );
            let mut err = ApiError::throttled(retry_after);
            if let Some(CorrelationId(id)) = req.extensions().get::<CorrelationId>() {
                err = err.with_correlation_id(id);
            }
            err.into_response()
        }
    }
}

/// Build the rate-limit key material from what the fronting layers resolved:
/// identity from the user header, address from `X-Forwarded-For`.
fn derive_request_key(req: &Request<Body>) -> RequestKey {
    let mut key = RequestKey::new();

    if let Some(user) = req
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|u| !u.is_empty())
    {
        key = key.with_user(user);
    }

    if let Some(ip) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
    {
        key = key.with_ip(ip);
    }

    key
}
