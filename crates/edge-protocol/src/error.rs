//! Error types for the worker protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned in worker error responses.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed JSON, missing required fields, or invalid field values.
    InvalidRequest,
    /// Unknown operation requested.
    UnknownOperation,
    /// Message `type` is not one the worker understands.
    UnknownMessage,
    /// The cache storage backend failed.
    CacheFailure,
    /// The network fetch failed and no fallback was allowed.
    NetworkFailure,
    /// The worker generation has not been activated yet.
    NotActivated,
    /// Precaching failed during install.
    InstallFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::UnknownOperation => write!(f, "UNKNOWN_OPERATION"),
            Self::UnknownMessage => write!(f, "UNKNOWN_MESSAGE"),
            Self::CacheFailure => write!(f, "CACHE_FAILURE"),
            Self::NetworkFailure => write!(f, "NETWORK_FAILURE"),
            Self::NotActivated => write!(f, "NOT_ACTIVATED"),
            Self::InstallFailed => write!(f, "INSTALL_FAILED"),
        }
    }
}

/// Worker error response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerError {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
    /// Optional machine-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WorkerError {
    /// Create a new worker error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new worker error with additional data.
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create an UNKNOWN_OPERATION error.
    pub fn unknown_operation(op: &str) -> Self {
        Self::with_data(
            ErrorCode::UnknownOperation,
            format!("unknown operation: {}", op),
            serde_json::json!({ "op": op }),
        )
    }

    /// Create an UNKNOWN_MESSAGE error.
    pub fn unknown_message(kind: &str) -> Self {
        Self::with_data(
            ErrorCode::UnknownMessage,
            format!("unknown message type: {}", kind),
            serde_json::json!({ "type": kind }),
        )
    }

    /// Create a CACHE_FAILURE error.
    pub fn cache_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheFailure, message)
    }

    /// Create a NETWORK_FAILURE error for the given URL.
    pub fn network_failure(url: &str, reason: &str) -> Self {
        Self::with_data(
            ErrorCode::NetworkFailure,
            format!("fetch of '{}' failed: {}", url, reason),
            serde_json::json!({ "url": url }),
        )
    }

    /// Create a NOT_ACTIVATED error.
    pub fn not_activated(state: &str) -> Self {
        Self::with_data(
            ErrorCode::NotActivated,
            format!("worker generation is {}, not activated", state),
            serde_json::json!({ "state": state }),
        )
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for WorkerError {}
