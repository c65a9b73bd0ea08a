//! Worker request envelope.

use serde::{Deserialize, Serialize};

/// Worker request envelope.
///
/// The worker entrypoint reads one JSON envelope per line on stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Caller-chosen request ID for correlation.
    pub request_id: String,
    /// Operation name (see [`crate::names`]).
    pub op: String,
    /// Operation-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WorkerRequest {
    pub fn new(request_id: impl Into<String>, op: &str, payload: serde_json::Value) -> Self {
        Self {
            request_id: request_id.into(),
            op: op.to_string(),
            payload,
        }
    }
}
