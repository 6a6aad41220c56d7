//! # restguard-api
//!
//! The HTTP surface of RestGuard: axum middleware for request correlation and
//! admission control, precondition/version header plumbing, the pagination
//! contract, the structured error envelope, runtime configuration, and a
//! resource router wiring the guard components end to end.

pub mod config;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod middleware;
pub mod pagination;

pub use config::{GuardConfig, loader::load_config};
pub use error::{ApiError, ErrorKind};
pub use handlers::{GuardState, ResourceView, router};
pub use headers::{ApiResponse, Precondition, check_if_none_match, not_modified, parse_if_match};
pub use middleware::{CorrelationId, RateLimitState, rate_limit, request_id};
pub use pagination::{PageParams, PageRequest, PageResult, PaginationLimits};
