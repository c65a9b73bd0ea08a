//! Storage quota reports and alert levels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TelemetryError;

/// A point-in-time measurement of storage usage versus quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageReport {
    pub usage: u64,
    pub quota: u64,
    /// `usage * 100 / quota`, or 0 when the quota is unknown.
    pub percent: f64,
    /// Cache store names with their entry counts.
    pub caches: Vec<(String, usize)>,
    pub local_bytes: u64,
    pub session_bytes: u64,
    pub taken_at: DateTime<Utc>,
}

impl StorageReport {
    pub fn percent_of(usage: u64, quota: u64) -> f64 {
        if quota == 0 {
            0.0
        } else {
            usage as f64 * 100.0 / quota as f64
        }
    }

    pub fn total_cache_entries(&self) -> usize {
        self.caches.iter().map(|(_, n)| n).sum()
    }
}

/// Alert severity, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
    Emergency,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
            AlertLevel::Emergency => "emergency",
        }
    }
}

/// Percent thresholds; each bound is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub warning: f64,
    pub critical: f64,
    pub emergency: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warning: 70.0,
            critical: 85.0,
            emergency: 95.0,
        }
    }
}

impl AlertThresholds {
    /// The highest band `percent` reaches, if any.
    pub fn level(&self, percent: f64) -> Option<AlertLevel> {
        if percent >= self.emergency {
            Some(AlertLevel::Emergency)
        } else if percent >= self.critical {
            Some(AlertLevel::Critical)
        } else if percent >= self.warning {
            Some(AlertLevel::Warning)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        let ordered = 0.0 < self.warning
            && self.warning < self.critical
            && self.critical < self.emergency
            && self.emergency <= 100.0;
        if ordered {
            Ok(())
        } else {
            Err(TelemetryError::InvalidThresholds(format!(
                "need 0 < warning ({}) < critical ({}) < emergency ({}) <= 100",
                self.warning, self.critical, self.emergency
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_are_inclusive() {
        let t = AlertThresholds::default();
        assert_eq!(t.level(69.99), None);
        assert_eq!(t.level(70.0), Some(AlertLevel::Warning));
        assert_eq!(t.level(84.99), Some(AlertLevel::Warning));
        assert_eq!(t.level(85.0), Some(AlertLevel::Critical));
        assert_eq!(t.level(95.0), Some(AlertLevel::Emergency));
        assert_eq!(t.level(100.0), Some(AlertLevel::Emergency));
    }

    #[test]
    fn test_percent_of_unknown_quota() {
        assert_eq!(StorageReport::percent_of(500, 0), 0.0);
        assert_eq!(StorageReport::percent_of(70, 100), 70.0);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(AlertThresholds::default().validate().is_ok());
        let bad = AlertThresholds {
            warning: 90.0,
            critical: 85.0,
            emergency: 95.0,
        };
        assert!(bad.validate().is_err());
        let over = AlertThresholds {
            emergency: 101.0,
            ..Default::default()
        };
        assert!(over.validate().is_err());
    }
}
