//! Storage estimation sources.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use edge_worker::CacheStorage;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::TelemetryError;

/// Usage and quota in bytes, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEstimate {
    pub usage: u64,
    pub quota: u64,
}

/// Platform storage estimation. `None` means the feature is unavailable.
pub trait StorageEstimator: Send + Sync {
    fn estimate(&self) -> Option<StorageEstimate>;
}

/// Estimates from a cache storage backend with a configured quota.
///
/// Backends without a quota report as unavailable.
pub struct CacheStorageEstimator {
    storage: Arc<dyn CacheStorage>,
}

impl CacheStorageEstimator {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }
}

impl StorageEstimator for CacheStorageEstimator {
    fn estimate(&self) -> Option<StorageEstimate> {
        let quota = self.storage.quota_bytes()?;
        match self.storage.usage_bytes() {
            Ok(usage) => Some(StorageEstimate { usage, quota }),
            Err(e) => {
                warn!(error = %e, "storage usage unavailable");
                None
            }
        }
    }
}

/// A string key-value area (local or session storage).
pub trait KeyValueArea: Send + Sync {
    fn entries(&self) -> Vec<(String, String)>;
}

/// In-memory key-value area. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryArea {
    items: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut items) = self.items.write() {
            items.insert(key.into(), value.into());
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.items
            .write()
            .map(|mut items| items.remove(key).is_some())
            .unwrap_or(false)
    }
}

impl KeyValueArea for MemoryArea {
    fn entries(&self) -> Vec<(String, String)> {
        match self.items.read() {
            Ok(items) => items.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub(crate) fn compile_patterns(patterns: &[String]) -> Result<GlobSet, TelemetryError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| TelemetryError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| TelemetryError::InvalidPattern {
        pattern: patterns.join(","),
        reason: e.to_string(),
    })
}

/// Rough byte size of the cache-like keys in an area.
///
/// Strings are UTF-16 in the browser, so each char counts two bytes.
pub fn rough_area_bytes(area: &dyn KeyValueArea, cache_keys: &GlobSet) -> u64 {
    area.entries()
        .iter()
        .filter(|(key, _)| cache_keys.is_match(key))
        .map(|(key, value)| ((key.chars().count() + value.chars().count()) * 2) as u64)
        .sum()
}
