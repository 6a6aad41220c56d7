//! Bucket storage behind the limiter.
//!
//! The trait exists so clustered deployments can back buckets with a shared
//! store; the in-memory implementation keys buckets in a sharded map and is
//! infallible. Bucket mutation happens under the map's per-key entry guard,
//! so concurrent admits for the same key never lose updates.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Instant;

use crate::bucket::BucketState;
use crate::error::LimiterError;
use crate::policy::{Decision, LimitPolicy};

/// Backing store for rate-limit buckets.
#[async_trait]
pub trait LimitStore: Send + Sync {
    /// Atomically consume `cost` units from the bucket for `bucket_key`,
    /// creating the bucket lazily on first use.
    async fn admit(
        &self,
        bucket_key: &str,
        policy: &LimitPolicy,
        cost: u32,
        now: Instant,
    ) -> Result<Decision, LimiterError>;

    /// Return `cost` units consumed by a previously allowed admit.
    async fn refund(
        &self,
        bucket_key: &str,
        policy: &LimitPolicy,
        cost: u32,
    ) -> Result<(), LimiterError>;
}

/// Process-local bucket store.
#[derive(Debug, Default)]
pub struct MemoryLimitStore {
    buckets: DashMap<String, BucketState>,
}

impl MemoryLimitStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Number of live buckets, for diagnostics.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[async_trait]
impl LimitStore for MemoryLimitStore {
    async fn admit(
        &self,
        bucket_key: &str,
        policy: &LimitPolicy,
        cost: u32,
        now: Instant,
    ) -> Result<Decision, LimiterError> {
        let mut entry = self
            .buckets
            .entry(bucket_key.to_string())
            .or_insert_with(|| BucketState::new(policy, now));
        Ok(entry.value_mut().admit(policy, now, cost))
    }

    async fn refund(
        &self,
        bucket_key: &str,
        policy: &LimitPolicy,
        cost: u32,
    ) -> Result<(), LimiterError> {
        if let Some(mut entry) = self.buckets.get_mut(bucket_key) {
            entry.value_mut().refund(policy, cost);
        }
        Ok(())
    }
}
