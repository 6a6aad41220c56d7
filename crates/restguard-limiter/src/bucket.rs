//! Per-key bucket state machines.
//!
//! State transitions are pure over a caller-supplied `now` instant so the
//! algorithms are testable without sleeping; the store layer supplies wall
//! time in production.

use crate::policy::{Decision, LimitPolicy, round_up};
use std::time::{Duration, Instant};

/// Mutable state of one rate-limit bucket. The variant always matches the
/// policy it was created from.
#[derive(Debug, Clone, Copy)]
pub enum BucketState {
    FixedWindow {
        window_start: Instant,
        count: u32,
    },
    SlidingWindow {
        window_start: Instant,
        previous: u32,
        current: u32,
    },
    TokenBucket {
        tokens: f64,
        last_refill: Instant,
    },
}

impl BucketState {
    /// Creates a fresh bucket for `policy`, lazily on first request for a key.
    pub fn new(policy: &LimitPolicy, now: Instant) -> Self {
        match policy {
            LimitPolicy::FixedWindow { .. } => Self::FixedWindow {
                window_start: now,
                count: 0,
            },
            LimitPolicy::SlidingWindow { .. } => Self::SlidingWindow {
                window_start: now,
                previous: 0,
                current: 0,
            },
            LimitPolicy::TokenBucket { capacity, .. } => Self::TokenBucket {
                tokens: f64::from(*capacity),
                last_refill: now,
            },
        }
    }

    /// Attempts to consume `cost` units at `now`.
    pub fn admit(&mut self, policy: &LimitPolicy, now: Instant, cost: u32) -> Decision {
        match (self, policy) {
            (
                Self::FixedWindow {
                    window_start,
                    count,
                },
                LimitPolicy::FixedWindow { capacity, window },
            ) => {
                let elapsed = now.saturating_duration_since(*window_start);
                if elapsed >= *window {
                    // Roll forward past any fully elapsed windows.
                    let periods = elapsed.as_nanos() / window.as_nanos().max(1);
                    *window_start += window.saturating_mul(periods as u32);
                    *count = 0;
                }
                if count.saturating_add(cost) <= *capacity {
                    *count += cost;
                    Decision::Allow
                } else {
                    let until_reset = (*window_start + *window).saturating_duration_since(now);
                    Decision::Deny {
                        retry_after: round_up(until_reset, policy.resolution()),
                    }
                }
            }
            (
                Self::SlidingWindow {
                    window_start,
                    previous,
                    current,
                },
                LimitPolicy::SlidingWindow { capacity, window },
            ) => {
                let elapsed = now.saturating_duration_since(*window_start);
                if elapsed >= window.saturating_mul(2) {
                    *window_start = now;
                    *previous = 0;
                    *current = 0;
                } else if elapsed >= *window {
                    *window_start += *window;
                    *previous = *current;
                    *current = 0;
                }

                let into_window = now.saturating_duration_since(*window_start).as_secs_f64()
                    / window.as_secs_f64();
                let weight = (1.0 - into_window).clamp(0.0, 1.0);
                let weighted = f64::from(*previous) * weight + f64::from(*current);

                if weighted + f64::from(cost) <= f64::from(*capacity) {
                    *current += cost;
                    Decision::Allow
                } else {
                    // Time until the previous window's contribution decays
                    // enough to admit `cost`, or until the next roll if the
                    // current window alone is over capacity.
                    let overshoot =
                        weighted + f64::from(cost) - f64::from(*capacity);
                    let retry = if *previous > 0 && overshoot <= f64::from(*previous) * weight {
                        Duration::from_secs_f64(
                            window.as_secs_f64() * (overshoot / f64::from(*previous)),
                        )
                    } else {
                        (*window_start + *window).saturating_duration_since(now)
                    };
                    Decision::Deny {
                        retry_after: round_up(retry, policy.resolution()),
                    }
                }
            }
            (
                Self::TokenBucket {
                    tokens,
                    last_refill,
                },
                LimitPolicy::TokenBucket {
                    capacity,
                    refill_per_sec,
                },
            ) => {
                let elapsed = now.saturating_duration_since(*last_refill).as_secs_f64();
                *tokens = (*tokens + elapsed * refill_per_sec).min(f64::from(*capacity));
                *last_refill = now;

                if *tokens >= f64::from(cost) {
                    *tokens -= f64::from(cost);
                    Decision::Allow
                } else {
                    let deficit = f64::from(cost) - *tokens;
                    let retry = if *refill_per_sec > 0.0 {
                        Duration::from_secs_f64(deficit / refill_per_sec)
                    } else {
                        policy.resolution()
                    };
                    Decision::Deny {
                        retry_after: round_up(retry, policy.resolution()),
                    }
                }
            }
            // Bucket/policy variant mismatch means the registry handed us a
            // bucket created under a different policy for the same key.
            // Rebuild and retry once.
            (state, policy) => {
                *state = Self::new(policy, now);
                state.admit(policy, now, cost)
            }
        }
    }

    /// Returns `cost` units consumed by a previously allowed admit. Used when
    /// a later rule denies the request so that denied requests consume no
    /// budget.
    pub fn refund(&mut self, policy: &LimitPolicy, cost: u32) {
        match self {
            Self::FixedWindow { count, .. } | Self::SlidingWindow { current: count, .. } => {
                *count = count.saturating_sub(cost);
            }
            Self::TokenBucket { tokens, .. } => {
                *tokens = (*tokens + f64::from(cost)).min(f64::from(policy.capacity()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(capacity: u32, window_secs: u64) -> LimitPolicy {
        LimitPolicy::FixedWindow {
            capacity,
            window: Duration::from_secs(window_secs),
        }
    }

    fn sliding(capacity: u32, window_secs: u64) -> LimitPolicy {
        LimitPolicy::SlidingWindow {
            capacity,
            window: Duration::from_secs(window_secs),
        }
    }

    #[test]
    fn test_fixed_window_enforces_capacity() {
        let policy = fixed(3, 10);
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);

        for _ in 0..3 {
            assert_eq!(state.admit(&policy, t0, 1), Decision::Allow);
        }
        let denied = state.admit(&policy, t0, 1);
        assert!(!denied.is_allowed());
        // Full window remains; retry-after is the time to the boundary.
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_fixed_window_resets_at_boundary() {
        let policy = fixed(2, 10);
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);

        assert_eq!(state.admit(&policy, t0, 2), Decision::Allow);
        assert!(!state.admit(&policy, t0, 1).is_allowed());

        let t1 = t0 + Duration::from_secs(10);
        assert_eq!(state.admit(&policy, t1, 2), Decision::Allow);
    }

    #[test]
    fn test_fixed_window_rolls_past_idle_windows() {
        let policy = fixed(1, 10);
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);
        assert_eq!(state.admit(&policy, t0, 1), Decision::Allow);

        // Three idle windows later the bucket admits again and retry-after
        // is computed against the current window, not the stale one.
        let t1 = t0 + Duration::from_secs(35);
        assert_eq!(state.admit(&policy, t1, 1), Decision::Allow);
        let denied = state.admit(&policy, t1, 1);
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_sliding_window_smooths_boundary_burst() {
        let policy = sliding(10, 10);
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);

        // Fill the first window completely.
        assert_eq!(state.admit(&policy, t0, 10), Decision::Allow);

        // Just after the boundary the previous window still weighs ~0.9, so a
        // fresh burst of 10 must not pass.
        let t1 = t0 + Duration::from_secs(11);
        assert!(!state.admit(&policy, t1, 10).is_allowed());

        // Halfway through, half the previous count has decayed.
        let t2 = t0 + Duration::from_secs(15);
        assert_eq!(state.admit(&policy, t2, 5), Decision::Allow);
    }

    #[test]
    fn test_sliding_window_fully_idle_resets() {
        let policy = sliding(5, 10);
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);
        assert_eq!(state.admit(&policy, t0, 5), Decision::Allow);

        let t1 = t0 + Duration::from_secs(25);
        assert_eq!(state.admit(&policy, t1, 5), Decision::Allow);
    }

    #[test]
    fn test_token_bucket_burst_then_steady_state() {
        let policy = LimitPolicy::TokenBucket {
            capacity: 5,
            refill_per_sec: 1.0,
        };
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);

        // Burst up to capacity.
        assert_eq!(state.admit(&policy, t0, 5), Decision::Allow);
        let denied = state.admit(&policy, t0, 1);
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(1)));

        // One token refilled after a second.
        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(state.admit(&policy, t1, 1), Decision::Allow);
        assert!(!state.admit(&policy, t1, 1).is_allowed());
    }

    #[test]
    fn test_token_bucket_refill_caps_at_capacity() {
        let policy = LimitPolicy::TokenBucket {
            capacity: 2,
            refill_per_sec: 1.0,
        };
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);
        assert_eq!(state.admit(&policy, t0, 2), Decision::Allow);

        // A long idle period refills to capacity, not beyond.
        let t1 = t0 + Duration::from_secs(3600);
        assert_eq!(state.admit(&policy, t1, 2), Decision::Allow);
        assert!(!state.admit(&policy, t1, 1).is_allowed());
    }

    #[test]
    fn test_retry_after_rounds_up_to_resolution() {
        let policy = LimitPolicy::TokenBucket {
            capacity: 1,
            refill_per_sec: 4.0,
        };
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);
        assert_eq!(state.admit(&policy, t0, 1), Decision::Allow);

        // Raw deficit is 250ms; resolution is one second.
        let denied = state.admit(&policy, t0, 1);
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_refund_restores_budget() {
        let policy = fixed(1, 60);
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);

        assert_eq!(state.admit(&policy, t0, 1), Decision::Allow);
        state.refund(&policy, 1);
        assert_eq!(state.admit(&policy, t0, 1), Decision::Allow);
    }

    #[test]
    fn test_refund_token_bucket_clamps_to_capacity() {
        let policy = LimitPolicy::TokenBucket {
            capacity: 3,
            refill_per_sec: 1.0,
        };
        let t0 = Instant::now();
        let mut state = BucketState::new(&policy, t0);
        state.refund(&policy, 10);
        // Still only capacity available.
        assert_eq!(state.admit(&policy, t0, 3), Decision::Allow);
        assert!(!state.admit(&policy, t0, 1).is_allowed());
    }
}
