//! In-memory reference backends.
//!
//! `MemoryStore` keeps records in a sharded concurrent map and generates
//! version tokens from an atomic counter. Conditional writes perform the
//! version check and bump while holding the map entry, so the check-then-write
//! is atomic per key without any global lock.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::StorageError;
use crate::traits::{TtlStore, VersionedStore};
use crate::types::{ListParams, RecordPage, StoredRecord};
use restguard_core::VersionToken;

/// In-memory versioned store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, StoredRecord>,
    version_counter: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            version_counter: AtomicU64::new(1),
        }
    }

    /// Generates the next version token. Tokens are monotonic per store and
    /// never reused.
    fn next_version(&self) -> VersionToken {
        VersionToken::new(
            self.version_counter
                .fetch_add(1, Ordering::SeqCst)
                .to_string(),
        )
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl VersionedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StorageError> {
        Ok(self.records.get(key).map(|r| r.clone()))
    }

    async fn put(
        &self,
        key: &str,
        payload: Value,
        expected: Option<&VersionToken>,
    ) -> Result<StoredRecord, StorageError> {
        // The entry guard gives exclusive access to this key for the whole
        // check-then-bump sequence.
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if let Some(expected) = expected
                    && occupied.get().version != *expected
                {
                    return Err(StorageError::version_conflict(
                        expected.as_str(),
                        occupied.get().version.as_str(),
                    ));
                }
                let updated = occupied.get().new_version(self.next_version(), payload);
                occupied.insert(updated.clone());
                Ok(updated)
            }
            Entry::Vacant(vacant) => {
                if let Some(expected) = expected {
                    tracing::debug!(key = %key, expected = %expected, "conditional write against missing record");
                    return Err(StorageError::not_found(key));
                }
                let record = StoredRecord::new(key, self.next_version(), payload);
                vacant.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn put_existing(&self, key: &str, payload: Value) -> Result<StoredRecord, StorageError> {
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let updated = occupied.get().new_version(self.next_version(), payload);
                occupied.insert(updated.clone());
                Ok(updated)
            }
            Entry::Vacant(_) => Err(StorageError::not_found(key)),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.records
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn list(&self, prefix: &str, params: &ListParams) -> Result<RecordPage, StorageError> {
        let mut matching: Vec<StoredRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| a.key.cmp(&b.key));

        let total = matching.len() as u64;
        let records = matching
            .into_iter()
            .skip(params.offset)
            .take(params.limit)
            .collect();

        Ok(RecordPage { records, total })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct TtlEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-memory TTL store mirroring the L2 collaborator contract.
#[derive(Default)]
pub struct MemoryTtlStore {
    entries: DashMap<String, TtlEntry>,
}

impl MemoryTtlStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StorageError> {
        self.entries.insert(
            key.to_string(),
            TtlEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_creates_and_assigns_version() {
        let store = MemoryStore::new();
        let record = store.put("items/1", json!({"n": 1}), None).await.unwrap();
        assert_eq!(record.key, "items/1");
        assert_eq!(record.version, VersionToken::new("1"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_put_bumps_version_on_update() {
        let store = MemoryStore::new();
        let first = store.put("items/1", json!({"n": 1}), None).await.unwrap();
        let second = store
            .put("items/1", json!({"n": 2}), Some(&first.version))
            .await
            .unwrap();
        assert_ne!(first.version, second.version);
        assert_eq!(second.payload, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_conditional_put_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        let first = store.put("items/1", json!({"n": 1}), None).await.unwrap();
        store
            .put("items/1", json!({"n": 2}), Some(&first.version))
            .await
            .unwrap();

        let err = store
            .put("items/1", json!({"n": 3}), Some(&first.version))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn test_unconditional_put_always_succeeds() {
        let store = MemoryStore::new();
        store.put("items/1", json!({"n": 1}), None).await.unwrap();
        // Another writer bumps the version behind our back.
        store.put("items/1", json!({"n": 2}), None).await.unwrap();
        // No precondition: last write wins regardless.
        let third = store.put("items/1", json!({"n": 3}), None).await.unwrap();
        assert_eq!(third.payload, json!({"n": 3}));
    }

    #[tokio::test]
    async fn test_conditional_put_against_missing_record() {
        let store = MemoryStore::new();
        let err = store
            .put("items/1", json!({}), Some(&VersionToken::new("1")))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_with_same_token_exactly_one_wins() {
        let store = Arc::new(MemoryStore::new());
        let initial = store.put("items/1", json!({"n": 0}), None).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let expected = initial.version.clone();
            handles.push(tokio::spawn(async move {
                store
                    .put("items/1", json!({ "writer": i }), Some(&expected))
                    .await
            }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(StorageError::VersionConflict { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_put_existing_requires_presence() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.put_existing("items/1", json!({})).await.unwrap_err(),
            StorageError::NotFound { .. }
        ));

        let first = store.put("items/1", json!({"n": 1}), None).await.unwrap();
        let updated = store.put_existing("items/1", json!({"n": 2})).await.unwrap();
        assert_ne!(first.version, updated.version);
        assert_eq!(updated.payload, json!({"n": 2}));

        // Once deleted, the record cannot be resurrected through this path.
        store.remove("items/1").await.unwrap();
        assert!(matches!(
            store.put_existing("items/1", json!({"n": 3})).await.unwrap_err(),
            StorageError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.remove("items/1").await.unwrap_err(),
            StorageError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_pagination_and_total() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .put(&format!("items/{i}"), json!({ "n": i }), None)
                .await
                .unwrap();
        }
        store.put("other/1", json!({}), None).await.unwrap();

        let page = store
            .list("items/", &ListParams::new(0, 2))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.records[0].key, "items/0");

        let past_end = store
            .list("items/", &ListParams::new(10, 2))
            .await
            .unwrap();
        assert!(past_end.is_empty());
        assert_eq!(past_end.total, 5);
    }

    #[tokio::test]
    async fn test_ttl_store_expiry() {
        let store = MemoryTtlStore::new();
        store
            .set("k", b"v".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_store_remove_is_idempotent() {
        let store = MemoryTtlStore::new();
        store.remove("missing").await.unwrap();
        store
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
