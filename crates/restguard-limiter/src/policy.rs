//! Rate-limiting policies and admission decisions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A rate-limiting algorithm with its parameters, selected per endpoint at
/// registration time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimitPolicy {
    /// Count resets at the window boundary. Simplest; allows bursts of up to
    /// twice the capacity across a boundary.
    FixedWindow { capacity: u32, window: Duration },
    /// Weighted count across the previous and current window; smooths
    /// boundary bursts.
    SlidingWindow { capacity: u32, window: Duration },
    /// Continuous refill at `refill_per_sec` up to `capacity`; supports a
    /// burst of `capacity` then steady-state refill.
    TokenBucket { capacity: u32, refill_per_sec: f64 },
}

impl LimitPolicy {
    /// The policy's retry-after resolution. Deny durations are rounded up to
    /// a multiple of this, matching the second granularity of the HTTP
    /// `Retry-After` header.
    pub fn resolution(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// The configured admission capacity.
    pub fn capacity(&self) -> u32 {
        match self {
            Self::FixedWindow { capacity, .. }
            | Self::SlidingWindow { capacity, .. }
            | Self::TokenBucket { capacity, .. } => *capacity,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny {
        /// Time until the bucket/window would next admit the request, rounded
        /// up to the policy's resolution.
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Allow => None,
            Self::Deny { retry_after } => Some(*retry_after),
        }
    }
}

/// What to do when the limiter's backing store is unreachable.
///
/// Per endpoint class: read endpoints default to open, endpoints marked
/// sensitive default to closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Admit when the store cannot be consulted.
    #[default]
    Open,
    /// Deny when the store cannot be consulted.
    Closed,
}

/// Round `duration` up to the next multiple of `resolution`, never below one
/// resolution step.
pub(crate) fn round_up(duration: Duration, resolution: Duration) -> Duration {
    let res = resolution.as_nanos().max(1);
    let steps = duration.as_nanos().div_ceil(res).max(1);
    // Retry-after horizons are far below the u64 nanosecond range.
    Duration::from_nanos((steps * res) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_helpers() {
        assert!(Decision::Allow.is_allowed());
        assert_eq!(Decision::Allow.retry_after(), None);

        let deny = Decision::Deny {
            retry_after: Duration::from_secs(3),
        };
        assert!(!deny.is_allowed());
        assert_eq!(deny.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_round_up_to_resolution() {
        let res = Duration::from_secs(1);
        assert_eq!(round_up(Duration::from_millis(1), res), res);
        assert_eq!(round_up(Duration::from_millis(1500), res), Duration::from_secs(2));
        assert_eq!(round_up(Duration::from_secs(2), res), Duration::from_secs(2));
        // Zero still yields one resolution step.
        assert_eq!(round_up(Duration::ZERO, res), res);
    }

    #[test]
    fn test_fail_mode_default_is_open() {
        assert_eq!(FailMode::default(), FailMode::Open);
    }

    #[test]
    fn test_policy_capacity() {
        let policy = LimitPolicy::TokenBucket {
            capacity: 10,
            refill_per_sec: 2.0,
        };
        assert_eq!(policy.capacity(), 10);
    }
}
