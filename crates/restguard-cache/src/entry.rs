//! Cached payloads and TTL policy.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CacheError;

/// A cached payload with its expiry bookkeeping.
///
/// Data is held behind an `Arc` so hits hand out cheap clones instead of
/// copying the payload per reader.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self::from_shared(Arc::new(data), ttl)
    }

    pub fn from_shared(data: Arc<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            data,
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// How quickly a class of data goes stale. Each class maps to a TTL pair
/// via [`TtlTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityClass {
    /// Reference data that changes on deploys, not at runtime.
    Static,
    /// Data that changes on the order of minutes.
    Slow,
    /// Data that changes on the order of seconds.
    Frequent,
}

/// TTL pair for one volatility class. L1 must not outlive L2, otherwise the
/// in-process tier could serve data the shared tier has already dropped the
/// authority for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlProfile {
    #[serde(with = "duration_secs")]
    pub l1: Duration,
    #[serde(with = "duration_secs")]
    pub l2: Duration,
}

impl TtlProfile {
    pub const fn new(l1: Duration, l2: Duration) -> Self {
        Self { l1, l2 }
    }
}

/// Per-class TTL configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlTable {
    pub r#static: TtlProfile,
    pub slow: TtlProfile,
    pub frequent: TtlProfile,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            r#static: TtlProfile::new(Duration::from_secs(300), Duration::from_secs(3600)),
            slow: TtlProfile::new(Duration::from_secs(60), Duration::from_secs(600)),
            frequent: TtlProfile::new(Duration::from_secs(5), Duration::from_secs(30)),
        }
    }
}

impl TtlTable {
    pub fn profile(&self, class: VolatilityClass) -> TtlProfile {
        match class {
            VolatilityClass::Static => self.r#static,
            VolatilityClass::Slow => self.slow,
            VolatilityClass::Frequent => self.frequent,
        }
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        for (name, profile) in [
            ("static", self.r#static),
            ("slow", self.slow),
            ("frequent", self.frequent),
        ] {
            if profile.l1 > profile.l2 {
                return Err(CacheError::configuration(format!(
                    "ttl class '{name}': l1 ({}s) exceeds l2 ({}s)",
                    profile.l1.as_secs(),
                    profile.l2.as_secs()
                )));
            }
            if profile.l1.is_zero() {
                return Err(CacheError::configuration(format!(
                    "ttl class '{name}': l1 must be positive"
                )));
            }
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
