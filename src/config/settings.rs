//! Typed view of the merged configuration.

use edge_classifier::Selector;
use edge_worker::store::validate_store_name;
use edge_worker::WorkerConfig;
use serde::{Deserialize, Serialize};

use super::effective::ConfigError;
use crate::messaging::MessagingSettings;
use crate::telemetry::TelemetrySettings;

/// All edge settings, one section per subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeSettings {
    /// `[cache]`: worker generation, lanes and precache.
    pub cache: WorkerConfig,
    /// `[telemetry]`: storage quota polling and alert thresholds.
    pub telemetry: TelemetrySettings,
    /// `[messaging]`: transactional email/SMS/WhatsApp endpoints.
    pub messaging: MessagingSettings,
}

impl EdgeSettings {
    /// Deserialize and validate a merged config value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let settings: EdgeSettings = serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::ParseError(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cache = &self.cache;
        if cache.version == 0 {
            return Err(ConfigError::ValidationError(
                "cache.version must be >= 1".to_string(),
            ));
        }
        if validate_store_name(&cache.prefix).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "cache.prefix '{}' must be alphanumeric with '-', '_' or '.'",
                cache.prefix
            )));
        }
        if cache.freshness_window_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "cache.freshness_window_seconds must be > 0".to_string(),
            ));
        }
        Selector::new(&cache.selector)
            .map_err(|e| ConfigError::ValidationError(format!("cache.api_patterns: {}", e)))?;

        self.telemetry
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("telemetry: {}", e)))?;

        Ok(())
    }
}
