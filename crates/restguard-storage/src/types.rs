//! Data types shared by the storage traits.

use restguard_core::{ConcurrencyEnvelope, UtcTimestamp, VersionToken, now_utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resource as stored in the versioned storage engine.
///
/// The middleware treats the payload as opaque; domain meaning lives with the
/// caller. The version token is owned by the store and replaced on every
/// successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The record key (opaque resource identifier, e.g. `items/42`).
    pub key: String,
    /// The version token of this specific version.
    pub version: VersionToken,
    /// The payload content as JSON.
    pub payload: Value,
    /// When this version was written.
    #[serde(rename = "lastUpdated")]
    pub last_updated: UtcTimestamp,
    /// When the record was originally created.
    #[serde(rename = "createdAt")]
    pub created_at: UtcTimestamp,
}

impl StoredRecord {
    /// Creates a new `StoredRecord`.
    #[must_use]
    pub fn new(key: impl Into<String>, version: VersionToken, payload: Value) -> Self {
        let now = now_utc();
        Self {
            key: key.into(),
            version,
            payload,
            last_updated: now,
            created_at: now,
        }
    }

    /// Creates the next version of this record with updated content.
    #[must_use]
    pub fn new_version(&self, version: VersionToken, payload: Value) -> Self {
        Self {
            key: self.key.clone(),
            version,
            payload,
            last_updated: now_utc(),
            created_at: self.created_at,
        }
    }

    /// Builds the concurrency envelope exposed to callers on read.
    #[must_use]
    pub fn envelope(&self) -> ConcurrencyEnvelope {
        ConcurrencyEnvelope::new(self.version.clone(), self.last_updated)
    }
}

/// Parameters for a list query.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListParams {
    /// Number of records to skip.
    pub offset: usize,
    /// Maximum number of records to return.
    pub limit: usize,
}

impl ListParams {
    #[must_use]
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

/// Result of a list query: one page of records plus the exact total of the
/// unpaginated result set, computed from the same query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPage {
    /// The records in this page, in key order.
    pub records: Vec<StoredRecord>,
    /// Total count of matching records before offset/limit.
    pub total: u64,
}

impl RecordPage {
    /// Creates a new empty `RecordPage`.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of records in this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the page holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stored_record_new_version_keeps_identity() {
        let first = StoredRecord::new("items/1", VersionToken::new("1"), json!({"n": 1}));
        let second = first.new_version(VersionToken::new("2"), json!({"n": 2}));

        assert_eq!(second.key, "items/1");
        assert_eq!(second.version, VersionToken::new("2"));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_updated >= first.last_updated);
    }

    #[test]
    fn test_envelope_reflects_current_version() {
        let record = StoredRecord::new("items/1", VersionToken::new("7"), json!({}));
        let envelope = record.envelope();
        assert_eq!(envelope.version, VersionToken::new("7"));
        assert_eq!(envelope.etag(), "W/\"7\"");
    }

    #[test]
    fn test_record_serialization_field_names() {
        let record = StoredRecord::new("items/1", VersionToken::new("1"), json!({"a": true}));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["key"], "items/1");
        assert_eq!(json["version"], "1");
        assert!(json["lastUpdated"].is_string());
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn test_record_page_helpers() {
        let page = RecordPage::empty();
        assert!(page.is_empty());
        assert_eq!(page.len(), 0);
        assert_eq!(page.total, 0);
    }
}
