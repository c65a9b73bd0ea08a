//! Cross-tab message contract.
//!
//! Clients post [`ClientMessage`]s to the worker; request/response pairs
//! answer over a dedicated reply channel. After a generation rollover the
//! worker broadcasts [`WorkerBroadcast::CacheUpdated`] to every open client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages a client page can post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Delete every cache store; answered with [`ClearCacheReply`].
    ClearCache,
    /// Activate a waiting generation without waiting for tabs to close.
    SkipWaiting,
    /// Report store names with entry counts; answered with [`CacheStats`].
    GetCacheStats,
}

impl ClientMessage {
    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::ClearCache => "CLEAR_CACHE",
            ClientMessage::SkipWaiting => "SKIP_WAITING",
            ClientMessage::GetCacheStats => "GET_CACHE_STATS",
        }
    }

    /// Parse a raw JSON message, reporting the unrecognised `type` on failure.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, String> {
        serde_json::from_value(value.clone()).map_err(|_| {
            value
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("<missing>")
                .to_string()
        })
    }
}

/// Messages the worker broadcasts to every open client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerBroadcast {
    /// A new cache generation finished activating.
    CacheUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u32>,
    },
}

/// Reply to `CLEAR_CACHE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCacheReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClearCacheReply {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Entry count of a single store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub name: String,
    pub entries: usize,
}

/// Reply to `GET_CACHE_STATS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub stores: Vec<StoreStats>,
    pub usage_bytes: u64,
    pub taken_at: DateTime<Utc>,
}

impl CacheStats {
    pub fn total_entries(&self) -> usize {
        self.stores.iter().map(|s| s.entries).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_updated_wire_shape() {
        let json = serde_json::to_value(WorkerBroadcast::CacheUpdated { version: None }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "CACHE_UPDATED" }));
    }

    #[test]
    fn test_client_message_parse() {
        let msg = ClientMessage::from_value(&serde_json::json!({ "type": "CLEAR_CACHE" })).unwrap();
        assert_eq!(msg, ClientMessage::ClearCache);
        assert_eq!(msg.kind(), "CLEAR_CACHE");
    }

    #[test]
    fn test_client_message_unknown_type() {
        let err = ClientMessage::from_value(&serde_json::json!({ "type": "PING" })).unwrap_err();
        assert_eq!(err, "PING");
        let err = ClientMessage::from_value(&serde_json::json!({})).unwrap_err();
        assert_eq!(err, "<missing>");
    }

    #[test]
    fn test_clear_cache_reply_shape() {
        let json = serde_json::to_string(&ClearCacheReply::succeeded()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }
}
