//! Redis-backed L2 tier.
//!
//! Wraps a deadpool connection pool behind [`TtlStore`], so clustered
//! deployments share one L2 while the rest of the cache stays agnostic.
//! Every error maps to `StorageError::Unavailable`; the cache layer treats
//! those as misses rather than failures.

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};
use std::time::Duration;

use restguard_storage::{StorageError, TtlStore};

pub struct RedisTtlStore {
    pool: Pool,
}

impl RedisTtlStore {
    /// Connect to Redis at `url` (e.g. `redis://localhost:6379`).
    pub fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StorageError::unavailable(format!("redis pool creation failed: {e}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::unavailable(format!("redis connection failed: {e}")))
    }
}

#[async_trait]
impl TtlStore for RedisTtlStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| StorageError::unavailable(format!("redis GET failed: {e}")))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        // Redis expiry has whole-second resolution; never round down to 0.
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs)
            .await
            .map_err(|e| StorageError::unavailable(format!("redis SETEX failed: {e}")))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| StorageError::unavailable(format!("redis DEL failed: {e}")))
    }
}
