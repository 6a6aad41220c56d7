//! Collaborator traits consumed by the middleware.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::StorageError;
use crate::types::{ListParams, RecordPage, StoredRecord};
use restguard_core::VersionToken;

/// A storage engine with atomic read-version / compare-and-swap-write
/// semantics. Implementations must be thread-safe (`Send + Sync`).
///
/// The version check in [`put`](VersionedStore::put) and the version bump are
/// one logical transaction: of two concurrent writers supplying the same
/// expected token, exactly one may succeed.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Reads a record by key.
    ///
    /// Returns `None` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing records.
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StorageError>;

    /// Writes a record, creating it if absent.
    ///
    /// If `expected` is provided, the write succeeds only if the stored
    /// version matches; the check and the version bump are atomic. If
    /// `expected` is `None` the write is unconditional (last-write-wins) and
    /// still assigns a fresh version token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::VersionConflict` if `expected` does not match.
    /// Returns `StorageError::NotFound` if `expected` is provided but the
    /// record does not exist.
    async fn put(
        &self,
        key: &str,
        payload: Value,
        expected: Option<&VersionToken>,
    ) -> Result<StoredRecord, StorageError>;

    /// Replaces an existing record regardless of its current version.
    ///
    /// Serves `If-Match: *` writes: the existence check and the write are one
    /// atomic step, so a concurrent delete cannot slip in between them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn put_existing(&self, key: &str, payload: Value) -> Result<StoredRecord, StorageError>;

    /// Removes a record by key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Lists records whose key starts with `prefix`, in key order.
    ///
    /// The returned page carries the exact total of the unpaginated result
    /// set, computed from the same query.
    async fn list(&self, prefix: &str, params: &ListParams) -> Result<RecordPage, StorageError>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// A shared store providing get/set/delete with TTL, used as the L2 cache
/// tier. In clustered deployments this is a distributed store; the in-memory
/// implementation serves tests and single-node setups.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Fetches a value, or `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores a value with the given time-to-live.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StorageError>;

    /// Removes a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that VersionedStore is object-safe
    fn _assert_store_object_safe(_: &dyn VersionedStore) {}

    // Compile-time test that TtlStore is object-safe
    fn _assert_ttl_store_object_safe(_: &dyn TtlStore) {}
}
