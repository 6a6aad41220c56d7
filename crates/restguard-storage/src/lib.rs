//! # restguard-storage
//!
//! Collaborator interfaces consumed by the RestGuard middleware:
//!
//! - [`VersionedStore`]: a storage engine that assigns a fresh
//!   [`restguard_core::VersionToken`] on every successful write and performs
//!   the version check atomically with the version bump (compare-and-swap
//!   semantics).
//! - [`TtlStore`]: a shared get/set/delete-with-TTL store used as the L2 cache
//!   tier.
//!
//! The in-memory implementations ([`MemoryStore`], [`MemoryTtlStore`]) are the
//! reference backends used by tests and single-node deployments. Production
//! deployments substitute their own implementations behind the same traits.

mod error;
mod memory;
mod traits;
mod types;

pub use error::StorageError;
pub use memory::{MemoryStore, MemoryTtlStore};
pub use traits::{TtlStore, VersionedStore};
pub use types::{ListParams, RecordPage, StoredRecord};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared versioned store trait object.
pub type DynStore = std::sync::Arc<dyn VersionedStore>;

/// Type alias for a shared L2 cache store trait object.
pub type DynTtlStore = std::sync::Arc<dyn TtlStore>;
