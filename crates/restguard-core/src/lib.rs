pub mod error;
pub mod time;
pub mod version;

pub use error::{CoreError, ErrorCategory, Result};
pub use time::{UtcTimestamp, now_utc};
pub use version::{ConcurrencyEnvelope, VersionToken, WriteCheck, parse_etag, validate_write};
