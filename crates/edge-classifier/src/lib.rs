//! Cache policy selector for intercepted requests.
//!
//! Classifies a request into one of four handling lanes using two
//! independent classifiers: the path against configured API route patterns,
//! then the declared resource kind. Pure dispatch, no I/O; anything
//! unmatched falls through to the default pass-through lane.

mod config;
mod result;

pub use config::{SelectorConfig, SelectorError, DEFAULT_API_PATTERNS};
pub use result::{Lane, LaneSelection, SelectionReason};

use config::RoutePattern;
use edge_protocol::{InterceptedRequest, Method, ResourceKind};

/// Compiled selector.
#[derive(Debug, Clone)]
pub struct Selector {
    patterns: Vec<RoutePattern>,
}

impl Selector {
    /// Compile the configured route patterns.
    pub fn new(config: &SelectorConfig) -> Result<Self, SelectorError> {
        Ok(Self {
            patterns: config.compile()?,
        })
    }

    /// Classify an intercepted request.
    pub fn select(&self, request: &InterceptedRequest) -> LaneSelection {
        classify(request, &self.patterns)
    }

    /// Source text of the API route pattern matching `path`, if any.
    pub fn matching_api_pattern(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(path))
            .map(|p| p.source.as_str())
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self {
            patterns: SelectorConfig::default()
                .compile()
                .unwrap_or_default(),
        }
    }
}

fn classify(request: &InterceptedRequest, patterns: &[RoutePattern]) -> LaneSelection {
    if request.method != Method::Get {
        return LaneSelection::new(Lane::Default, SelectionReason::NonGet(request.method));
    }

    let path = request.path();
    if let Some(pattern) = patterns.iter().find(|p| p.regex.is_match(path)) {
        return LaneSelection::new(Lane::Api, SelectionReason::ApiRoute(pattern.source.clone()));
    }

    match request.kind {
        ResourceKind::Script | ResourceKind::Style | ResourceKind::Document => {
            LaneSelection::new(Lane::Static, SelectionReason::ResourceKind(request.kind))
        }
        ResourceKind::Image => {
            LaneSelection::new(Lane::Image, SelectionReason::ResourceKind(request.kind))
        }
        ResourceKind::Unclassified => LaneSelection::new(Lane::Default, SelectionReason::Unclassified),
    }
}
