//! Selector configuration types.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Default API route patterns (Supabase REST plus the app's own `/api`).
pub const DEFAULT_API_PATTERNS: &[&str] = &["^/rest/v1/", "^/api/"];

/// Configuration for the cache policy selector, derived from edge config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Regular expressions matched against the request path.
    #[serde(default = "default_api_patterns")]
    pub api_patterns: Vec<String>,
}

fn default_api_patterns() -> Vec<String> {
    DEFAULT_API_PATTERNS.iter().map(|p| p.to_string()).collect()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            api_patterns: default_api_patterns(),
        }
    }
}

/// Errors building a selector.
#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("invalid API route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A compiled API route pattern.
#[derive(Debug, Clone)]
pub(crate) struct RoutePattern {
    pub(crate) source: String,
    pub(crate) regex: Regex,
}

impl SelectorConfig {
    pub(crate) fn compile(&self) -> Result<Vec<RoutePattern>, SelectorError> {
        self.api_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map(|regex| RoutePattern {
                        source: p.clone(),
                        regex,
                    })
                    .map_err(|e| SelectorError::InvalidPattern {
                        pattern: p.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SelectorConfig::default();
        assert_eq!(config.api_patterns, vec!["^/rest/v1/", "^/api/"]);
    }

    #[test]
    fn test_missing_patterns_use_defaults() {
        let config: SelectorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SelectorConfig::default());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = SelectorConfig {
            api_patterns: vec!["^/rest/(".to_string()],
        };
        let err = config.compile().unwrap_err();
        assert!(err.to_string().contains("^/rest/("));
    }
}
