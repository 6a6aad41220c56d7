//! # restguard-cache
//!
//! Two-tier caching with stampede protection.
//!
//! ## Architecture
//!
//! - **L1 (DashMap)**: in-process, short TTLs, per-instance
//! - **L2 ([`restguard_storage::TtlStore`])**: shared, longer TTLs; in-memory
//!   for single-node setups, Redis ([`RedisTtlStore`]) for clusters
//! - **Single-flight**: one recomputation per key; concurrent callers await
//!   the in-flight result instead of recomputing
//!
//! Lookup order is L1 → L2 → compute; an L2 hit is promoted into L1 before
//! returning. Keys carry a deployment-scoped prefix and a per-namespace
//! generation marker, so rolling deployments and namespace invalidation make
//! stale payloads unreachable without a synchronous sweep of L2.

mod entry;
mod error;
mod flight;
mod hybrid;
mod keys;
mod redis_store;

pub use entry::{CachedEntry, TtlProfile, TtlTable, VolatilityClass};
pub use error::CacheError;
pub use hybrid::{CacheStats, HybridCache};
pub use keys::CacheKey;
pub use redis_store::RedisTtlStore;
