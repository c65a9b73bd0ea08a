//! Worker response envelope.

use serde::{Deserialize, Serialize};
use crate::error::WorkerError;

/// Worker response envelope.
///
/// Every request line yields exactly one response line on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// Request ID echoed from the request.
    pub request_id: String,
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Success payload (present when ok=true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Error details (present when ok=false).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkerError>,
}

impl WorkerResponse {
    /// Create a success response.
    pub fn success(request_id: String, payload: serde_json::Value) -> Self {
        Self {
            request_id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(request_id: String, error: WorkerError) -> Self {
        Self {
            request_id,
            ok: false,
            payload: None,
            error: Some(error),
        }
    }
}
