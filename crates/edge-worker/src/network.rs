//! Network access for the lanes.
//!
//! The lanes only see [`Network`]; the worker binary plugs in
//! [`HttpNetwork`] and tests plug in scripted doubles.

use std::collections::BTreeMap;

use edge_protocol::{HttpResponse, InterceptedRequest, Method};

/// A fetch that produced no response at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("network unreachable: {0}")]
    Unreachable(String),

    #[error("request aborted: {0}")]
    Aborted(String),
}

/// Performs the real fetch for an intercepted request.
pub trait Network: Send + Sync {
    fn fetch(&self, request: &InterceptedRequest) -> Result<HttpResponse, NetworkError>;
}

/// Blocking HTTP client backed by reqwest.
///
/// No per-request timeout is configured beyond the client default.
pub struct HttpNetwork {
    client: reqwest::blocking::Client,
}

impl HttpNetwork {
    pub fn new() -> Result<Self, NetworkError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("petcare-edge-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Unreachable(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Network for HttpNetwork {
    fn fetch(&self, request: &InterceptedRequest) -> Result<HttpResponse, NetworkError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Options => reqwest::Method::OPTIONS,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                NetworkError::Aborted(e.to_string())
            } else {
                NetworkError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }
        let body = response
            .bytes()
            .map_err(|e| NetworkError::Aborted(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// A network that is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNetwork;

impl Network for OfflineNetwork {
    fn fetch(&self, request: &InterceptedRequest) -> Result<HttpResponse, NetworkError> {
        Err(NetworkError::Unreachable(format!("offline: {}", request.url)))
    }
}
