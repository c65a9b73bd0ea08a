//! Worker configuration.
//!
//! This is also the `[cache]` section of the edge config file, so every
//! field has a serde default.

use std::fs;
use std::path::Path;
use std::time::Duration;

use edge_classifier::SelectorConfig;
use serde::{Deserialize, Serialize};

/// What the image lane returns when both cache and network miss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFallback {
    /// Synthesized 503 so the page can see the failure.
    #[default]
    Unavailable,
    /// Empty 200, silently masking the failure.
    EmptyOk,
}

/// Worker configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Prefix for store names (`<prefix>-static-v<version>`).
    pub prefix: String,
    /// Cache generation; bump to roll every store over.
    pub version: u32,
    /// Origin precache paths are resolved against.
    pub origin: String,
    /// Paths fetched into the static store on install.
    pub precache: Vec<String>,
    /// Document served when a navigation fails and has no snapshot.
    pub navigation_fallback: Option<String>,
    /// API lane freshness window in seconds.
    pub freshness_window_seconds: u64,
    /// Path suffixes that mark a script/style URL as a genuine asset.
    pub asset_extensions: Vec<String>,
    /// Image lane behavior on total failure.
    pub image_fallback: ImageFallback,
    /// Take over immediately after install instead of waiting for tabs.
    pub skip_waiting_on_install: bool,
    /// API route classification.
    #[serde(flatten)]
    pub selector: SelectorConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            prefix: "petcare".to_string(),
            version: 1,
            origin: "http://localhost:3000".to_string(),
            precache: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
            ],
            navigation_fallback: Some("/index.html".to_string()),
            freshness_window_seconds: 300,
            asset_extensions: vec![
                ".js".to_string(),
                ".mjs".to_string(),
                ".css".to_string(),
                ".map".to_string(),
            ],
            image_fallback: ImageFallback::Unavailable,
            skip_waiting_on_install: true,
            selector: SelectorConfig::default(),
        }
    }
}

/// Errors loading the worker config from an edge config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {reason}")]
    Parse { path: String, reason: String },
}

impl WorkerConfig {
    /// Load the `[cache]` section of an edge config file.
    ///
    /// Other sections are ignored; a file without `[cache]` yields defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigFileError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|reason| ConfigFileError::Parse {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        let doc: toml::Table = toml::from_str(contents).map_err(|e| e.to_string())?;
        match doc.get("cache") {
            Some(cache) => cache
                .clone()
                .try_into()
                .map_err(|e: toml::de::Error| format!("[cache]: {}", e)),
            None => Ok(Self::default()),
        }
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_seconds)
    }

    /// Resolve a path against the configured origin.
    pub fn absolute_url(&self, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        let origin = self.origin.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", origin, path)
        } else {
            format!("{}/{}", origin, path)
        }
    }
}
