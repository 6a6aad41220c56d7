//! Rate-limit key derivation.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// What a rule keys its buckets on. Resolved from configuration at
/// registration time, never hard-coded in handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScope {
    /// One bucket per authenticated identity.
    PerUser,
    /// One bucket per client address.
    PerIp,
    /// A single shared bucket.
    Global,
}

/// The identity/address material extracted from a request by the caller's
/// identity extractor. Either field may be absent (anonymous request, missing
/// peer address).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestKey {
    pub user: Option<String>,
    pub ip: Option<IpAddr>,
}

impl RequestKey {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }
}

impl KeyScope {
    /// Derives the bucket key for this scope, or `None` when the request
    /// carries no material for it (the rule then does not apply).
    pub fn derive(&self, request: &RequestKey) -> Option<String> {
        match self {
            Self::PerUser => request.user.as_ref().map(|u| format!("user:{u}")),
            Self::PerIp => request.ip.map(|ip| format!("ip:{ip}")),
            Self::Global => Some("global".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_per_user_derivation() {
        let request = RequestKey::new().with_user("alice");
        assert_eq!(
            KeyScope::PerUser.derive(&request),
            Some("user:alice".to_string())
        );
        assert_eq!(KeyScope::PerIp.derive(&request), None);
    }

    #[test]
    fn test_per_ip_derivation() {
        let request = RequestKey::new().with_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(
            KeyScope::PerIp.derive(&request),
            Some("ip:10.0.0.7".to_string())
        );
    }

    #[test]
    fn test_global_applies_to_anonymous_requests() {
        let request = RequestKey::new();
        assert_eq!(KeyScope::Global.derive(&request), Some("global".to_string()));
    }

    #[test]
    fn test_scope_deserialization() {
        let scope: KeyScope = serde_json::from_str("\"per_user\"").unwrap();
        assert_eq!(scope, KeyScope::PerUser);
        let scope: KeyScope = serde_json::from_str("\"global\"").unwrap();
        assert_eq!(scope, KeyScope::Global);
    }
}
