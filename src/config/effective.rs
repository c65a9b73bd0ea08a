//! Effective configuration with provenance
//!
//! Records the merged configuration, every contributing source (with the
//! SHA-256 of its raw bytes) and which keys were redacted. The typed
//! [`EdgeSettings`] are derived from the unredacted merge before redaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::debug;

use super::defaults::builtin_layer;
use super::merge::merge_layers;
use super::settings::EdgeSettings;

/// Schema identifier
pub const SCHEMA_ID: &str = "petcare-edge/effective_config@1";

/// Origin of a configuration source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Project,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    fn inline(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            digest: None,
        }
    }
}

/// Merged configuration plus where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_id: String,

    pub created_at: DateTime<Utc>,

    /// The merged configuration, secrets redacted
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Redacted key paths
    pub redactions: Vec<String>,

    /// Typed settings from the unredacted merge
    #[serde(skip)]
    settings: EdgeSettings,
}

/// Keys that contain secrets and should be redacted
const SECRET_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "api_key",
    "auth",
    "credential",
];

impl EffectiveConfig {
    /// Merge built-in defaults, host file, project file and CLI overrides.
    ///
    /// Missing files are skipped; unreadable or invalid ones are errors.
    pub fn build(
        host_config_path: Option<&Path>,
        project_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![builtin_layer()];
        let mut sources = vec![ConfigSource::inline(ConfigOrigin::Builtin)];

        for (origin, path) in [
            (ConfigOrigin::Host, host_config_path),
            (ConfigOrigin::Project, project_config_path),
        ] {
            let Some(path) = path else { continue };
            if !path.exists() {
                debug!(path = %path.display(), "config file not present, skipping");
                continue;
            }
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource::inline(ConfigOrigin::Cli));
        }

        let mut merged = merge_layers(layers);
        let settings = EdgeSettings::from_value(&merged)?;
        let redactions = redact_secrets(&mut merged);

        Ok(Self {
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merged,
            sources,
            redactions,
            settings,
        })
    }

    pub fn settings(&self) -> &EdgeSettings {
        &self.settings
    }

    pub fn into_settings(self) -> EdgeSettings {
        self.settings
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a config value by dot-separated path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}

/// Parse a TOML file, returning it as JSON plus the digest of its bytes.
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("{}: invalid UTF-8: {}", path.display(), e)))?;
    let table: toml::Value = toml::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    Ok((toml_to_json(table), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Replace secret-looking scalar values, returning the redacted paths.
fn redact_secrets(value: &mut Value) -> Vec<String> {
    let mut redactions = Vec::new();
    redact_recursive(value, "", &mut redactions);
    redactions
}

fn redact_recursive(value: &mut Value, path: &str, redactions: &mut Vec<String>) {
    let Value::Object(map) = value else { return };
    for (key, val) in map.iter_mut() {
        let current = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };
        let lower = key.to_lowercase();
        let is_secret = SECRET_KEYS.iter().any(|s| lower.contains(s));

        if val.is_object() {
            redact_recursive(val, &current, redactions);
        } else if is_secret && !val.is_null() {
            *val = Value::String("[REDACTED]".to_string());
            redactions.push(current);
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_with_defaults_only() {
        let config = EffectiveConfig::build(None, None, None).unwrap();

        assert_eq!(config.get_u64("cache.version"), Some(1));
        assert_eq!(config.get_str("cache.prefix"), Some("petcare"));
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
    }

    #[test]
    fn test_cli_override_wins() {
        let cli = serde_json::json!({ "cache": { "version": 7 } });
        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();

        assert_eq!(config.settings().cache.version, 7);
        assert_eq!(config.sources.last().unwrap().origin, ConfigOrigin::Cli);
    }

    #[test]
    fn test_secret_redacted_but_usable() {
        let cli = serde_json::json!({ "messaging": { "auth_token": "s3cr3t" } });
        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();

        assert_eq!(config.get_str("messaging.auth_token"), Some("[REDACTED]"));
        assert!(config.redactions.contains(&"messaging.auth_token".to_string()));
        assert_eq!(config.settings().messaging.auth_token.as_deref(), Some("s3cr3t"));
        assert!(!config.to_json().unwrap().contains("s3cr3t"));
    }

    #[test]
    fn test_unset_secret_not_reported() {
        let config = EffectiveConfig::build(None, None, None).unwrap();
        assert!(config.redactions.is_empty());
    }

    #[test]
    fn test_project_file_layer() {
        let mut host = NamedTempFile::new().unwrap();
        writeln!(host, "[cache]").unwrap();
        writeln!(host, "version = 2").unwrap();
        writeln!(host, "origin = \"https://host.test\"").unwrap();

        let mut project = NamedTempFile::new().unwrap();
        writeln!(project, "[cache]").unwrap();
        writeln!(project, "version = 5").unwrap();

        let config = EffectiveConfig::build(Some(host.path()), Some(project.path()), None).unwrap();

        assert_eq!(config.settings().cache.version, 5);
        assert_eq!(config.settings().cache.origin, "https://host.test");
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[2].origin, ConfigOrigin::Project);
        assert_eq!(config.sources[1].digest.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn test_missing_file_skipped() {
        let config =
            EffectiveConfig::build(Some(Path::new("/nonexistent/edge.toml")), None, None).unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[cache").unwrap();
        let err = EffectiveConfig::build(Some(file.path()), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cli = serde_json::json!({ "telemetry": { "interval_seconds": 0 } });
        let err = EffectiveConfig::build(None, None, Some(cli)).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
