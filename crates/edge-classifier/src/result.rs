//! Selector result types.

use edge_protocol::{Method, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four handling lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Cache-first within the freshness window, network otherwise.
    Api,
    /// Network-first for scripts, styles and documents.
    Static,
    /// Cache-first, unconditionally.
    Image,
    /// Straight to the network, never cached.
    Default,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Api => "api",
            Lane::Static => "static",
            Lane::Image => "image",
            Lane::Default => "default",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason for a lane choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "detail")]
pub enum SelectionReason {
    /// Method other than GET; the store only holds GET responses.
    #[serde(rename = "NON_GET")]
    NonGet(Method),

    /// Path matched a configured API route pattern.
    #[serde(rename = "API_ROUTE")]
    ApiRoute(String),

    /// Chosen by declared resource kind.
    #[serde(rename = "RESOURCE_KIND")]
    ResourceKind(ResourceKind),

    /// Nothing matched.
    #[serde(rename = "UNCLASSIFIED")]
    Unclassified,
}

impl SelectionReason {
    /// Get a machine-readable string representation.
    pub fn to_code(&self) -> String {
        match self {
            SelectionReason::NonGet(m) => format!("NON_GET:{}", m),
            SelectionReason::ApiRoute(p) => format!("API_ROUTE:{}", p),
            SelectionReason::ResourceKind(k) => format!("RESOURCE_KIND:{}", k),
            SelectionReason::Unclassified => "UNCLASSIFIED".to_string(),
        }
    }
}

/// Result of classifying an intercepted request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaneSelection {
    pub lane: Lane,
    pub reason: SelectionReason,
}

impl LaneSelection {
    pub fn new(lane: Lane, reason: SelectionReason) -> Self {
        Self { lane, reason }
    }

    /// Human-readable one-liner for `explain` output.
    pub fn explain(&self) -> String {
        let why = match &self.reason {
            SelectionReason::NonGet(m) => format!("{} requests are never cached", m),
            SelectionReason::ApiRoute(p) => format!("path matches API route pattern {}", p),
            SelectionReason::ResourceKind(k) => format!("declared resource kind is {}", k),
            SelectionReason::Unclassified => "no pattern or resource kind matched".to_string(),
        };
        format!("lane={} ({})", self.lane, why)
    }
}
