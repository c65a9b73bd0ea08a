//! Storage telemetry
//!
//! Periodically measures storage usage against the platform quota, lists
//! cache stores with their entry counts and sizes the cache-like keys of the
//! local/session key-value areas. Crossing a threshold raises an alert
//! through the [`AlertSink`] and runs the registered cleanup hooks; after an
//! alert every further alert is suppressed for the cooldown period.
//!
//! Estimation being unavailable is not an error: the poll is skipped.

mod cleanup;
mod estimate;
mod monitor;
mod poller;
mod report;

pub use cleanup::CacheCleanup;
pub use estimate::{
    rough_area_bytes, CacheStorageEstimator, KeyValueArea, MemoryArea, StorageEstimate,
    StorageEstimator,
};
pub use monitor::{AlertSink, ListenerHandle, LogSink, PollOutcome, StorageMonitor};
pub use poller::Poller;
pub use report::{AlertLevel, AlertThresholds, StorageReport};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default glob patterns for cache-like key-value keys.
pub const DEFAULT_CACHE_KEY_PATTERNS: &[&str] = &["*cache*", "*query*", "sb-*"];

/// Errors building or running telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid cache key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("failed to start poller thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// `[telemetry]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Seconds between background polls.
    pub interval_seconds: u64,
    /// Seconds during which alerts are suppressed after one fires.
    pub cooldown_seconds: u64,
    pub warning_percent: f64,
    pub critical_percent: f64,
    pub emergency_percent: f64,
    /// Dynamic-store snapshots older than this are dropped by the optimize hook.
    pub optimize_max_age_seconds: u64,
    /// Globs selecting cache-like keys in local/session storage.
    pub cache_key_patterns: Vec<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            interval_seconds: 600,
            cooldown_seconds: 300,
            warning_percent: 70.0,
            critical_percent: 85.0,
            emergency_percent: 95.0,
            optimize_max_age_seconds: 24 * 60 * 60,
            cache_key_patterns: DEFAULT_CACHE_KEY_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl TelemetrySettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn optimize_max_age(&self) -> Duration {
        Duration::from_secs(self.optimize_max_age_seconds)
    }

    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            warning: self.warning_percent,
            critical: self.critical_percent,
            emergency: self.emergency_percent,
        }
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.interval_seconds == 0 {
            return Err(TelemetryError::InvalidInterval(
                "interval_seconds must be > 0".to_string(),
            ));
        }
        self.thresholds().validate()?;
        estimate::compile_patterns(&self.cache_key_patterns)?;
        Ok(())
    }
}
