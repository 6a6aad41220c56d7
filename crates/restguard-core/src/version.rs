//! Optimistic concurrency primitives.
//!
//! A [`VersionToken`] is an opaque identifier assigned by the storage engine
//! to every stored version of a resource. The guard never interprets it; it
//! only compares tokens for equality. [`ConcurrencyEnvelope`] is the
//! externally visible pairing of a version token with a `lastModified`
//! timestamp, rendered as a weak ETag plus `Last-Modified` header on reads and
//! consumed from `If-Match` on the next write attempt.

use crate::time::UtcTimestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, storage-owned version identifier for a resource instance.
///
/// Tokens are replaced on every successful mutation and never reused. The
/// middleware compares them for equality only; ordering is a storage concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Externally visible version representation for a resource: the current
/// version token plus the `lastModified` timestamp. Created on read, consumed
/// on the next write attempt for the same resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyEnvelope {
    pub version: VersionToken,
    #[serde(rename = "lastModified")]
    pub last_modified: UtcTimestamp,
}

impl ConcurrencyEnvelope {
    pub fn new(version: VersionToken, last_modified: UtcTimestamp) -> Self {
        Self {
            version,
            last_modified,
        }
    }

    /// Render the version token as a weak entity tag.
    pub fn etag(&self) -> String {
        format!("W/\"{}\"", self.version)
    }

    /// Render the timestamp as an RFC1123 HTTP date for `Last-Modified`.
    pub fn last_modified_http(&self) -> String {
        self.last_modified.http_date()
    }
}

/// Parse a single entity tag (weak or strong) back into a version token.
///
/// Returns `None` for malformed tags. The wildcard `*` is handled by the
/// header layer, not here.
pub fn parse_etag(value: &str) -> Option<VersionToken> {
    let value = value.trim();
    let quoted = value.strip_prefix("W/").unwrap_or(value);
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    if inner.is_empty() {
        return None;
    }
    Some(VersionToken::new(inner))
}

/// Outcome of a write precondition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCheck {
    /// The write may proceed; storage must bump the version atomically with it.
    Proceed,
    /// The supplied version is stale; the write must be rejected.
    Conflict,
}

/// Validate a write attempt against the resource's current version.
///
/// An absent envelope means the caller opted out of concurrency checking and
/// the write proceeds unconditionally (last-write-wins). The equality check
/// here is advisory; the storage engine repeats it atomically with the
/// version bump so two writers holding the same prior token can never both
/// succeed.
pub fn validate_write(supplied: Option<&VersionToken>, current: &VersionToken) -> WriteCheck {
    match supplied {
        None => WriteCheck::Proceed,
        Some(token) if token == current => WriteCheck::Proceed,
        Some(_) => WriteCheck::Conflict,
    }
}
