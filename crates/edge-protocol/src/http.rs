//! Intercepted request and response model.
//!
//! A request enters the worker with its URL, method and declared resource
//! kind (the platform "destination"). Responses are plain values so a
//! snapshot can be cloned before it is stored.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// HTTP request method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// Declared resource kind of an intercepted request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Script,
    Style,
    Document,
    Image,
    #[default]
    Unclassified,
}

impl ResourceKind {
    /// Map a platform destination string onto a resource kind.
    ///
    /// Anything the lanes do not distinguish (fonts, workers, `""`) is
    /// unclassified.
    pub fn from_destination(destination: &str) -> Self {
        match destination.trim().to_ascii_lowercase().as_str() {
            "script" => ResourceKind::Script,
            "style" => ResourceKind::Style,
            "document" => ResourceKind::Document,
            "image" => ResourceKind::Image,
            _ => ResourceKind::Unclassified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Script => "script",
            ResourceKind::Style => "style",
            ResourceKind::Document => "document",
            ResourceKind::Image => "image",
            ResourceKind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup key into a cache store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub url: String,
    pub method: Method,
}

impl RequestIdentity {
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
        }
    }

    /// Shorthand for a GET identity.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, Method::Get)
    }

    /// Stable SHA-256 hex digest of `METHOD url`.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A request intercepted by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptedRequest {
    pub url: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl InterceptedRequest {
    pub fn new(url: impl Into<String>, method: Method, kind: ResourceKind) -> Self {
        Self {
            url: url.into(),
            method,
            kind,
            headers: BTreeMap::new(),
        }
    }

    /// Shorthand for a GET request of the given kind.
    pub fn get(url: impl Into<String>, kind: ResourceKind) -> Self {
        Self::new(url, Method::Get, kind)
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(self.url.clone(), self.method)
    }

    /// Path component of the URL, without query or fragment.
    pub fn path(&self) -> &str {
        url_path(&self.url)
    }
}

/// Extract the path of an absolute or origin-relative URL.
pub fn url_path(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(idx) => {
            let rest = &url[idx + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => url,
    };
    let end = after_scheme
        .find(&['?', '#'][..])
        .unwrap_or(after_scheme.len());
    let path = &after_scheme[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// A response returned to the intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, with = "body_base64")]
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// A JSON response with the given status.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string().into_bytes())
            .with_header("content-type", "application/json")
    }

    /// Synthesized 503 returned when neither network nor cache can answer.
    pub fn service_unavailable() -> Self {
        Self::json(
            503,
            &serde_json::json!({ "error": "offline", "message": "network unavailable and no cached copy" }),
        )
    }

    /// Empty 200 placeholder.
    pub fn empty_ok() -> Self {
        Self::new(200, Vec::new())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Header lookup; names are stored lowercase.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Parse the body as JSON.
    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

mod body_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
