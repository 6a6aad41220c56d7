//! The two-tier cache facade.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

use restguard_storage::DynTtlStore;

use crate::entry::{CachedEntry, TtlTable, VolatilityClass};
use crate::error::CacheError;
use crate::flight::{self, FlightRegistry, FlightRole};
use crate::keys::{self, CacheKey};

/// Two-tier read-through cache with single-flight recomputation.
///
/// Cloning is cheap and shares the underlying tiers, so one instance can be
/// handed to every request handler.
#[derive(Clone)]
pub struct HybridCache {
    inner: Arc<Inner>,
}

struct Inner {
    prefix: String,
    ttl: TtlTable,
    l1: DashMap<String, CachedEntry>,
    l2: Option<DynTtlStore>,
    generations: DashMap<String, u64>,
    flights: FlightRegistry,
}

/// Point-in-time cache diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub l1_entries: usize,
    pub in_flight: usize,
    pub mode: &'static str,
}

impl HybridCache {
    /// L1-only cache for single-node deployments.
    pub fn local(prefix: impl Into<String>, ttl: TtlTable) -> Result<Self, CacheError> {
        Self::build(prefix.into(), ttl, None)
    }

    /// L1 backed by a shared TTL store (Redis in clustered deployments).
    pub fn with_l2(
        prefix: impl Into<String>,
        ttl: TtlTable,
        l2: DynTtlStore,
    ) -> Result<Self, CacheError> {
        Self::build(prefix.into(), ttl, Some(l2))
    }

    fn build(prefix: String, ttl: TtlTable, l2: Option<DynTtlStore>) -> Result<Self, CacheError> {
        ttl.validate()?;
        if prefix.is_empty() || prefix.contains(':') {
            return Err(CacheError::configuration(
                "deployment prefix must be non-empty and colon-free",
            ));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                prefix,
                ttl,
                l1: DashMap::new(),
                l2,
                generations: DashMap::new(),
                flights: FlightRegistry::new(),
            }),
        })
    }

    /// Fetch `key`, recomputing on miss via `compute`.
    ///
    /// Lookup order is L1, then L2 (promoting a hit into L1), then a
    /// single-flight computation shared by all concurrent missers. The
    /// computation runs on its own task, so it finishes for the benefit of
    /// waiting callers even if the caller that started it goes away. A
    /// failed computation is reported to every waiter and caches nothing.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        class: VolatilityClass,
        compute: F,
    ) -> Result<Arc<Vec<u8>>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
    {
        let physical = self.physical_key(key);
        let profile = self.inner.ttl.profile(class);

        if let Some(entry) = self.inner.l1.get(&physical) {
            if !entry.is_expired() {
                tracing::debug!(key = %physical, "cache hit (L1)");
                return Ok(Arc::clone(&entry.data));
            }
            drop(entry);
            self.inner.l1.remove(&physical);
        }

        if let Some(l2) = &self.inner.l2 {
            match l2.get(&physical).await {
                Ok(Some(data)) => {
                    tracing::debug!(key = %physical, "cache hit (L2), promoting");
                    let data = Arc::new(data);
                    self.inner.l1.insert(
                        physical,
                        CachedEntry::from_shared(Arc::clone(&data), profile.l1),
                    );
                    return Ok(data);
                }
                Ok(None) => {}
                Err(e) => {
                    // A flaky shared tier must not take reads down with it.
                    tracing::warn!(key = %physical, error = %e, "L2 read failed, treating as miss");
                }
            }
        }

        match self.inner.flights.join(&physical) {
            FlightRole::Waiter(rx) => {
                tracing::debug!(key = %physical, "cache miss, awaiting in-flight computation");
                flight::await_result(rx).await
            }
            FlightRole::Owner(tx) => {
                tracing::debug!(key = %physical, "cache miss, computing");
                let future = compute();
                let inner = Arc::clone(&self.inner);
                let rx = tx.subscribe();
                tokio::spawn(async move {
                    match future.await {
                        Ok(bytes) => {
                            let data = Arc::new(bytes);
                            // Only the still-current flight may populate the
                            // tiers: an invalidation during the computation
                            // retires the flight, and its result must not
                            // resurrect pre-invalidation data.
                            let current = inner.flights.complete(
                                &physical,
                                &tx,
                                Ok(Arc::clone(&data)),
                            );
                            if current {
                                inner.l1.insert(
                                    physical.clone(),
                                    CachedEntry::from_shared(Arc::clone(&data), profile.l1),
                                );
                                if let Some(l2) = &inner.l2 {
                                    if let Err(e) =
                                        l2.set(&physical, (*data).clone(), profile.l2).await
                                    {
                                        tracing::warn!(key = %physical, error = %e, "L2 write failed");
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            inner
                                .flights
                                .complete(&physical, &tx, Err(CacheError::compute(e)));
                        }
                    }
                });
                flight::await_result(rx).await
            }
        }
    }

    /// Drop one key from both tiers.
    ///
    /// A computation already in flight for the key is retired as well: its
    /// waiters still receive the result they asked for, but it caches
    /// nothing, and the next caller recomputes.
    pub async fn invalidate(&self, key: &CacheKey) {
        let physical = self.physical_key(key);
        self.inner.flights.remove(&physical);
        self.inner.l1.remove(&physical);
        if let Some(l2) = &self.inner.l2 {
            if let Err(e) = l2.remove(&physical).await {
                tracing::warn!(key = %physical, error = %e, "L2 invalidation failed");
            }
        }
    }

    /// Invalidate every key in a namespace by bumping its generation. Old
    /// L2 entries become unreachable and age out via TTL; the local tier is
    /// swept eagerly since it is cheap to do so.
    pub fn invalidate_namespace(&self, namespace: &str) {
        let generation = {
            let mut entry = self
                .inner
                .generations
                .entry(namespace.to_string())
                .or_insert(0);
            *entry += 1;
            *entry
        };
        let marker = format!(":{namespace}:");
        self.inner.l1.retain(|key, _| !key.contains(&marker));
        tracing::debug!(namespace, generation, "namespace invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_entries: self.inner.l1.len(),
            in_flight: self.inner.flights.in_flight(),
            mode: if self.inner.l2.is_some() {
                "hybrid"
            } else {
                "local"
            },
        }
    }

    fn physical_key(&self, key: &CacheKey) -> String {
        let generation = self
            .inner
            .generations
            .get(&key.namespace)
            .map(|g| *g)
            .unwrap_or(0);
        keys::compose(&self.inner.prefix, generation, key)
    }
}
