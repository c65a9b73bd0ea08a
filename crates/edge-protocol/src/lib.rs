//! Petcare Edge Protocol Types
//!
//! Defines the intercepted request/response model, the cross-tab message
//! contract and the JSON envelope spoken by the edge worker entrypoint.

pub mod error;
pub mod http;
pub mod messages;
pub mod request;
pub mod response;

pub use error::{ErrorCode, WorkerError};
pub use http::{HttpResponse, InterceptedRequest, Method, RequestIdentity, ResourceKind};
pub use messages::{CacheStats, ClearCacheReply, ClientMessage, StoreStats, WorkerBroadcast};
pub use request::WorkerRequest;
pub use response::WorkerResponse;

/// Header carrying the capture timestamp of a stored snapshot (RFC 3339).
pub const CACHED_AT_HEADER: &str = "x-edge-cached-at";

/// Current edge lane version string.
pub const EDGE_VERSION: &str = "0.1.0";

/// Known worker operation names.
pub mod names {
    pub const FETCH: &str = "fetch";
    pub const MESSAGE: &str = "message";
    pub const INSTALL: &str = "install";
    pub const ACTIVATE: &str = "activate";
    pub const STATUS: &str = "status";
}
