//! Resource handlers wiring the guard components together.
//!
//! Routes are mounted under `/resources/{namespace}/{key}`. Reads flow
//! through the hybrid cache, so repeated reads of the same resource never
//! touch the storage engine; writes go through the compare-and-swap path
//! with the version taken from `If-Match` and invalidate the cached entry
//! once committed.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::headers::{self, ApiResponse, Precondition};
use crate::middleware::{self, CorrelationId, RateLimitState};
use crate::pagination::{PageParams, PageResult, PaginationLimits};
use restguard_cache::{CacheError, CacheKey, HybridCache, VolatilityClass};
use restguard_core::{ConcurrencyEnvelope, VersionToken};
use restguard_limiter::RateLimiter;
use restguard_storage::{DynStore, ListParams, StorageError, StoredRecord};

/// Shared state for the resource routes.
#[derive(Clone)]
pub struct GuardState {
    pub store: DynStore,
    pub cache: HybridCache,
    pub limits: PaginationLimits,
}

/// Build the guarded resource router: request ids, admission control, then
/// the handlers.
pub fn router(state: GuardState, limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/resources/{namespace}", get(list_resources))
        .route(
            "/resources/{namespace}/{key}",
            get(get_resource).put(put_resource).delete(delete_resource),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            RateLimitState::new(limiter),
            middleware::rate_limit,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
}

/// External representation of a stored resource. Cached renderings are
/// stored in this shape and read back for version headers, so it
/// deserializes as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceView {
    pub key: String,
    pub version: VersionToken,
    #[serde(rename = "lastModified")]
    pub last_modified: restguard_core::UtcTimestamp,
    pub payload: Value,
}

impl From<StoredRecord> for ResourceView {
    fn from(record: StoredRecord) -> Self {
        Self {
            key: record.key,
            version: record.version,
            last_modified: record.last_updated,
            payload: record.payload,
        }
    }
}

fn storage_key(namespace: &str, key: &str) -> String {
    format!("{namespace}/{key}")
}

fn correlate(err: ApiError, correlation: &Option<Extension<CorrelationId>>) -> ApiError {
    match correlation {
        Some(Extension(CorrelationId(id))) => err.with_correlation_id(id),
        None => err,
    }
}

/// Map a failed cached computation back to an API error. A missing record
/// surfaces from inside the compute closure and must stay a 404, not a 503.
fn compute_error(err: CacheError) -> ApiError {
    if let CacheError::Compute(cause) = &err
        && let Some(StorageError::NotFound { .. }) = cause.downcast_ref::<StorageError>()
    {
        return ApiError::not_found(cause.to_string());
    }
    ApiError::from(err)
}

async fn get_resource(
    State(state): State<GuardState>,
    Path((namespace, key)): Path<(String, String)>,
    correlation: Option<Extension<CorrelationId>>,
    req_headers: HeaderMap,
) -> Result<Response, ApiError> {
    let run = async {
        // Cache hits short-circuit the storage engine entirely; writes and
        // deletes invalidate this entry, so it never serves a stale version.
        // Missing records are not cached: the lookup error propagates and the
        // next read asks storage again.
        let cache_key = CacheKey::new(&namespace, &key);
        let store = Arc::clone(&state.store);
        let full_key = storage_key(&namespace, &key);
        let bytes = state
            .cache
            .get_or_compute(&cache_key, VolatilityClass::Frequent, move || async move {
                let record = store
                    .get(&full_key)
                    .await?
                    .ok_or_else(|| StorageError::not_found(&full_key))?;
                serde_json::to_vec(&ResourceView::from(record)).map_err(anyhow::Error::from)
            })
            .await
            .map_err(compute_error)?;

        let view: ResourceView = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(error = %e, "cached resource rendering is not valid JSON");
            ApiError::internal()
        })?;
        let envelope = ConcurrencyEnvelope::new(view.version.clone(), view.last_modified);

        if headers::check_if_none_match(&req_headers, &envelope.version) {
            return Ok(headers::not_modified(&envelope));
        }
        Ok(ApiResponse::ok(view).with_envelope(&envelope).into_response())
    };
    run.await.map_err(|e| correlate(e, &correlation))
}

async fn put_resource(
    State(state): State<GuardState>,
    Path((namespace, key)): Path<(String, String)>,
    correlation: Option<Extension<CorrelationId>>,
    req_headers: HeaderMap,
    body: Result<axum::Json<Value>, axum::extract::rejection::JsonRejection>,
) -> Result<Response, ApiError> {
    let run = async {
        let axum::Json(payload) =
            body.map_err(|e| ApiError::validation(format!("invalid JSON body: {e}")))?;

        let precondition = headers::parse_if_match(&req_headers)?;
        let full_key = storage_key(&namespace, &key);
        let record = match &precondition {
            // `If-Match: *` asserts existence only. The check and the write
            // are one store call, so a concurrent delete cannot slip in
            // between them and let the write resurrect the resource.
            Some(Precondition::Any) => state.store.put_existing(&full_key, payload).await,
            Some(Precondition::Version(token)) => {
                state.store.put(&full_key, payload, Some(token)).await
            }
            None => state.store.put(&full_key, payload, None).await,
        }
        .map_err(ApiError::from)?;
        let envelope = record.envelope();
        tracing::debug!(key = %full_key, version = %envelope.version, "resource written");

        state.cache.invalidate(&CacheKey::new(&namespace, &key)).await;

        Ok(
            ApiResponse::new(ResourceView::from(record), StatusCode::OK)
                .with_envelope(&envelope)
                .into_response(),
        )
    };
    run.await.map_err(|e| correlate(e, &correlation))
}

async fn delete_resource(
    State(state): State<GuardState>,
    Path((namespace, key)): Path<(String, String)>,
    correlation: Option<Extension<CorrelationId>>,
) -> Result<Response, ApiError> {
    let run = async {
        state
            .store
            .remove(&storage_key(&namespace, &key))
            .await
            .map_err(ApiError::from)?;
        // The generation bump covers the record's own entry and any
        // namespace-wide ones (listings, aggregates).
        state.cache.invalidate_namespace(&namespace);
        Ok(StatusCode::NO_CONTENT.into_response())
    };
    run.await.map_err(|e| correlate(e, &correlation))
}

async fn list_resources(
    State(state): State<GuardState>,
    Path(namespace): Path<String>,
    correlation: Option<Extension<CorrelationId>>,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let run = async {
        let request = params.validate(&state.limits)?;
        let page = state
            .store
            .list(
                &format!("{namespace}/"),
                &ListParams {
                    offset: request.skip,
                    limit: request.take,
                },
            )
            .await
            .map_err(ApiError::from)?;

        let result = PageResult::from_parts(
            page.records.into_iter().map(ResourceView::from).collect(),
            page.total,
        );
        Ok(ApiResponse::ok(result).into_response())
    };
    run.await.map_err(|e| correlate(e, &correlation))
}
