//! # restguard-limiter
//!
//! Admission control for the RestGuard pipeline. A [`RateLimiter`] is an
//! ordered set of [`LimitRule`]s resolved at registration time; each rule
//! combines a key scope (per-user, per-ip, global), a policy (fixed window,
//! sliding window, token bucket) and a failure mode for when the backing
//! store is unreachable.
//!
//! A request is denied if any applicable rule denies it; budget consumed by
//! earlier rules is refunded on deny so a denied request never burns quota.

mod bucket;
mod error;
mod key;
mod limiter;
mod policy;
mod store;

pub use bucket::BucketState;
pub use error::LimiterError;
pub use key::{KeyScope, RequestKey};
pub use limiter::{LimitRule, RateLimiter};
pub use policy::{Decision, FailMode, LimitPolicy};
pub use store::{LimitStore, MemoryLimitStore};

/// Type alias for a shared limit store trait object.
pub type DynLimitStore = std::sync::Arc<dyn LimitStore>;
