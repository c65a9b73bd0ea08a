//! Versioned cache storage
//!
//! A cache store is a named key-value container mapping a request identity
//! to an immutable response snapshot. Store names embed the generation
//! version (`petcare-static-v3`), so a rollover is a matter of deleting the
//! names that no longer match.
//!
//! ## Backends
//!
//! - [`MemoryStorage`]: shared in-process map, used by tests and embedders
//! - [`DiskStorage`]: one directory per store, one JSON file per entry
//!
//! Both provide atomic per-key put and delete; there is no cross-key
//! transaction, so a store deletion racing an in-flight put is unguarded.

mod disk;
mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use edge_protocol::{HttpResponse, RequestIdentity, CACHED_AT_HEADER};
use serde::{Deserialize, Serialize};

use crate::clock::elapsed;

/// Errors from cache storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid store name '{0}'")]
    InvalidName(String),

    #[error("corrupt cache entry {location}: {reason}")]
    Corrupt { location: String, reason: String },

    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// An immutable copy of a response plus its capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub response: HttpResponse,
    pub captured_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Snapshot a response, stamping the capture time into its headers.
    pub fn capture(response: HttpResponse, now: DateTime<Utc>) -> Self {
        let response = response.with_header(CACHED_AT_HEADER, now.to_rfc3339());
        Self {
            response,
            captured_at: now,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        elapsed(self.captured_at, now)
    }

    /// A snapshot is fresh while its age is strictly below the window.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.age(now) < window
    }

    /// Rough byte footprint used for quota accounting.
    pub fn size_bytes(&self) -> u64 {
        let headers: usize = self
            .response
            .headers
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum();
        (self.response.body.len() + headers) as u64
    }
}

/// The cache storage primitives the lanes and lifecycle are written against.
pub trait CacheStorage: Send + Sync {
    /// Create the store if it does not exist. Idempotent.
    fn open(&self, name: &str) -> StoreResult<()>;

    /// Look up a snapshot by request identity.
    fn match_entry(&self, name: &str, identity: &RequestIdentity)
        -> StoreResult<Option<StoredResponse>>;

    /// Insert or replace a snapshot. Opens the store if needed.
    fn put(&self, name: &str, identity: &RequestIdentity, snapshot: StoredResponse)
        -> StoreResult<()>;

    /// Remove a single entry. Returns whether it existed.
    fn remove_entry(&self, name: &str, identity: &RequestIdentity) -> StoreResult<bool>;

    /// Delete a whole store. Returns whether it existed.
    fn delete(&self, name: &str) -> StoreResult<bool>;

    /// Names of all existing stores, sorted.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// All entries of a store (empty if the store does not exist).
    fn entries(&self, name: &str) -> StoreResult<Vec<(RequestIdentity, StoredResponse)>>;

    /// Approximate bytes held across all stores.
    fn usage_bytes(&self) -> StoreResult<u64>;

    /// Configured byte quota, if the backend enforces one.
    fn quota_bytes(&self) -> Option<u64> {
        None
    }

    /// Number of entries in a store.
    fn entry_count(&self, name: &str) -> StoreResult<usize> {
        Ok(self.entries(name)?.len())
    }
}

/// Store names may only contain ASCII alphanumerics, `-`, `_` and `.`.
pub fn validate_store_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_capture_stamps_header() {
        let snap = StoredResponse::capture(HttpResponse::new(200, "ok"), t0());
        assert_eq!(
            snap.response.header(CACHED_AT_HEADER),
            Some(t0().to_rfc3339().as_str())
        );
    }

    #[test]
    fn test_freshness_boundary() {
        let snap = StoredResponse::capture(HttpResponse::new(200, "ok"), t0());
        let window = Duration::from_secs(300);
        assert!(snap.is_fresh(t0() + chrono::Duration::seconds(299), window));
        assert!(!snap.is_fresh(t0() + chrono::Duration::seconds(300), window));
    }

    #[test]
    fn test_store_name_validation() {
        assert!(validate_store_name("petcare-static-v1").is_ok());
        assert!(validate_store_name("").is_err());
        assert!(validate_store_name("../etc").is_err());
        assert!(validate_store_name("a/b").is_err());
    }
}
