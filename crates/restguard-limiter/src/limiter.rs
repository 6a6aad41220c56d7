//! The limiter facade: an ordered rule set evaluated per request.

use std::sync::Arc;
use std::time::Instant;

use crate::error::LimiterError;
use crate::key::{KeyScope, RequestKey};
use crate::policy::{Decision, FailMode, LimitPolicy};
use crate::store::LimitStore;

/// One configured limit: a named scope/policy pair with a failure mode.
#[derive(Debug, Clone)]
pub struct LimitRule {
    /// Rule name, used as the bucket-key namespace and in logs.
    pub name: String,
    pub scope: KeyScope,
    pub policy: LimitPolicy,
    pub fail_mode: FailMode,
}

impl LimitRule {
    pub fn new(name: impl Into<String>, scope: KeyScope, policy: LimitPolicy) -> Self {
        Self {
            name: name.into(),
            scope,
            policy,
            fail_mode: FailMode::default(),
        }
    }

    #[must_use]
    pub fn with_fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.fail_mode = fail_mode;
        self
    }
}

/// Admission gate for one endpoint class. An endpoint may combine several
/// rules (e.g. per-user AND global); a request is denied if any applicable
/// rule denies it.
pub struct RateLimiter {
    rules: Vec<LimitRule>,
    store: Arc<dyn LimitStore>,
}

impl RateLimiter {
    pub fn new(rules: Vec<LimitRule>, store: Arc<dyn LimitStore>) -> Self {
        Self { rules, store }
    }

    pub fn rules(&self) -> &[LimitRule] {
        &self.rules
    }

    /// Admit or deny a request at the current instant.
    pub async fn admit(&self, request: &RequestKey, cost: u32) -> Decision {
        self.admit_at(request, cost, Instant::now()).await
    }

    /// Admit or deny at an explicit instant (tests drive the clock).
    ///
    /// Rules are consulted in order. When a later rule denies, units already
    /// consumed from earlier rules are refunded, so a denied request never
    /// burns budget. Store failures resolve through the failing rule's
    /// [`FailMode`].
    pub async fn admit_at(&self, request: &RequestKey, cost: u32, now: Instant) -> Decision {
        let mut consumed: Vec<(String, &LimitRule)> = Vec::new();

        for rule in &self.rules {
            let Some(key) = rule.scope.derive(request) else {
                continue;
            };
            let bucket_key = format!("{}:{}", rule.name, key);

            let decision = match self.store.admit(&bucket_key, &rule.policy, cost, now).await {
                Ok(decision) => decision,
                Err(LimiterError::Unavailable { message } | LimiterError::Internal { message }) => {
                    match rule.fail_mode {
                        FailMode::Open => {
                            tracing::warn!(
                                rule = %rule.name,
                                error = %message,
                                "limit store unreachable, failing open"
                            );
                            // Nothing was consumed; no refund needed later.
                            continue;
                        }
                        FailMode::Closed => {
                            tracing::warn!(
                                rule = %rule.name,
                                error = %message,
                                "limit store unreachable, failing closed"
                            );
                            Decision::Deny {
                                retry_after: rule.policy.resolution(),
                            }
                        }
                    }
                }
            };

            match decision {
                Decision::Allow => consumed.push((bucket_key, rule)),
                Decision::Deny { retry_after } => {
                    for (key, earlier) in consumed {
                        if let Err(e) = self.store.refund(&key, &earlier.policy, cost).await {
                            tracing::warn!(bucket = %key, error = %e, "refund failed");
                        }
                    }
                    tracing::debug!(
                        rule = %rule.name,
                        bucket = %bucket_key,
                        retry_after_secs = retry_after.as_secs(),
                        "request denied"
                    );
                    return Decision::Deny { retry_after };
                }
            }
        }

        Decision::Allow
    }
}
