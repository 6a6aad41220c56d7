//! Runtime configuration.
//!
//! Loaded from an optional TOML file layered with `RESTGUARD__` environment
//! overrides (e.g. `RESTGUARD__PAGINATION__MAX_TAKE=200`), then validated as
//! a whole before anything is constructed from it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pagination::PaginationLimits;
use restguard_cache::TtlTable;
use restguard_limiter::{FailMode, KeyScope, LimitPolicy, LimitRule};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub limiter: LimiterConfig,
    pub cache: CacheConfig,
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub rules: Vec<RuleConfig>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rules: vec![RuleConfig {
                name: "global".to_string(),
                scope: KeyScope::Global,
                policy: PolicyConfig::TokenBucket {
                    capacity: 100,
                    refill_per_sec: 50.0,
                },
                fail_mode: FailMode::Open,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub scope: KeyScope,
    pub policy: PolicyConfig,
    #[serde(default)]
    pub fail_mode: FailMode,
}

/// TOML-friendly policy description with second-granularity windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum PolicyConfig {
    FixedWindow { capacity: u32, window_secs: u64 },
    SlidingWindow { capacity: u32, window_secs: u64 },
    TokenBucket { capacity: u32, refill_per_sec: f64 },
}

impl PolicyConfig {
    fn capacity(&self) -> u32 {
        match self {
            Self::FixedWindow { capacity, .. }
            | Self::SlidingWindow { capacity, .. }
            | Self::TokenBucket { capacity, .. } => *capacity,
        }
    }

    fn to_policy(&self) -> LimitPolicy {
        match *self {
            Self::FixedWindow {
                capacity,
                window_secs,
            } => LimitPolicy::FixedWindow {
                capacity,
                window: Duration::from_secs(window_secs),
            },
            Self::SlidingWindow {
                capacity,
                window_secs,
            } => LimitPolicy::SlidingWindow {
                capacity,
                window: Duration::from_secs(window_secs),
            },
            Self::TokenBucket {
                capacity,
                refill_per_sec,
            } => LimitPolicy::TokenBucket {
                capacity,
                refill_per_sec,
            },
        }
    }
}

impl RuleConfig {
    pub fn to_rule(&self) -> LimitRule {
        LimitRule::new(&self.name, self.scope, self.policy.to_policy())
            .with_fail_mode(self.fail_mode)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Deployment-scoped key prefix. Rotated by the deployment system so a
    /// new release never reads a predecessor's L2 entries.
    pub prefix: String,
    /// When set, an L2 tier is attached at this Redis URL.
    pub redis_url: Option<String>,
    pub ttl: TtlTable,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "restguard".to_string(),
            redis_url: None,
            ttl: TtlTable::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_take: usize,
    pub max_take: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_take: 20,
            max_take: 100,
        }
    }
}

impl GuardConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Limiter validations
        for rule in &self.limiter.rules {
            if rule.name.is_empty() {
                return Err("limiter rule name must not be empty".into());
            }
            if rule.policy.capacity() == 0 {
                return Err(format!("limiter rule '{}': capacity must be > 0", rule.name));
            }
            if let PolicyConfig::TokenBucket { refill_per_sec, .. } = rule.policy
                && refill_per_sec <= 0.0
            {
                return Err(format!(
                    "limiter rule '{}': refill_per_sec must be > 0",
                    rule.name
                ));
            }
            if let PolicyConfig::FixedWindow { window_secs, .. }
            | PolicyConfig::SlidingWindow { window_secs, .. } = rule.policy
                && window_secs == 0
            {
                return Err(format!(
                    "limiter rule '{}': window_secs must be > 0",
                    rule.name
                ));
            }
        }
        // Cache validations
        if self.cache.prefix.is_empty() || self.cache.prefix.contains(':') {
            return Err("cache.prefix must be non-empty and colon-free".into());
        }
        self.cache.ttl.validate().map_err(|e| e.to_string())?;
        // Pagination validations
        if self.pagination.default_take == 0 {
            return Err("pagination.default_take must be > 0".into());
        }
        if self.pagination.max_take == 0 {
            return Err("pagination.max_take must be > 0".into());
        }
        if self.pagination.default_take > self.pagination.max_take {
            return Err("pagination.default_take must be <= pagination.max_take".into());
        }
        Ok(())
    }

    pub fn pagination_limits(&self) -> PaginationLimits {
        PaginationLimits {
            default_take: self.pagination.default_take,
            max_take: self.pagination.max_take,
        }
    }

    pub fn build_rules(&self) -> Vec<LimitRule> {
        self.limiter.rules.iter().map(RuleConfig::to_rule).collect()
    }
}

pub mod loader {
    use super::GuardConfig;
    use config::{Config, Environment, File, FileFormat};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<GuardConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    // The format is pinned so config files work regardless of
                    // their extension (temp files often have none).
                    builder = builder.add_source(File::from(pathbuf).format(FileFormat::Toml));
                }
            }
            None => {
                let default_path = PathBuf::from("restguard.toml");
                if default_path.exists() {
                    builder =
                        builder.add_source(File::from(default_path).format(FileFormat::Toml));
                }
            }
        }
        // Environment variable overrides, e.g. RESTGUARD__PAGINATION__MAX_TAKE=200
        builder = builder.add_source(
            Environment::with_prefix("RESTGUARD")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: GuardConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
