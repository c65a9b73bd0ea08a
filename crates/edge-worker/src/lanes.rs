//! Lane handlers
//!
//! Each lane has its own read/write policy against the versioned stores:
//!
//! | Lane    | Store   | Policy                                                  |
//! |---------|---------|---------------------------------------------------------|
//! | api     | dynamic | cache-first inside the freshness window, else network   |
//! | static  | static  | network-first; scripts never fall back to a snapshot    |
//! | image   | dynamic | cache-first, unconditionally                            |
//! | default | -       | network pass-through                                    |
//!
//! Only 2xx responses are ever written. A failing cache read or write is
//! logged and otherwise ignored: the network response passes through.

use std::sync::Arc;

use edge_classifier::Lane;
use edge_protocol::{HttpResponse, InterceptedRequest, RequestIdentity, ResourceKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::{ImageFallback, WorkerConfig};
use crate::lifecycle::StoreNames;
use crate::network::{Network, NetworkError};
use crate::store::{CacheStorage, StoredResponse};

/// Where a handled response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Live network response.
    Network,
    /// Cache hit served without touching the network.
    Cache,
    /// Cached copy served because the network failed.
    StaleCache,
    /// Response made up by the worker (503, placeholder).
    Synthesized,
}

/// A response plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handled {
    pub response: HttpResponse,
    pub source: ResponseSource,
}

impl Handled {
    fn new(response: HttpResponse, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

/// Failures a lane surfaces instead of answering.
#[derive(Debug, thiserror::Error)]
pub enum LaneError {
    #[error("fetch of {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: NetworkError,
    },
}

/// Executes the per-lane policies.
pub struct LaneHandler {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
    names: StoreNames,
    config: WorkerConfig,
}

impl LaneHandler {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
        names: StoreNames,
        config: WorkerConfig,
    ) -> Self {
        Self {
            storage,
            network,
            clock,
            names,
            config,
        }
    }

    /// Handle a request on the given lane.
    pub fn handle(&self, request: &InterceptedRequest, lane: Lane) -> Result<Handled, LaneError> {
        match lane {
            Lane::Api => Ok(self.api_lane(request)),
            Lane::Static => self.static_lane(request),
            Lane::Image => Ok(self.image_lane(request)),
            Lane::Default => self.default_lane(request),
        }
    }

    fn api_lane(&self, request: &InterceptedRequest) -> Handled {
        let store = &self.names.dynamic_store;
        let identity = request.identity();
        let cached = self.lookup(store, &identity);

        if let Some(snapshot) = &cached {
            if snapshot.is_fresh(self.clock.now(), self.config.freshness_window()) {
                debug!(url = %request.url, "api lane: fresh cache hit");
                return Handled::new(snapshot.response.clone(), ResponseSource::Cache);
            }
        }

        match self.network.fetch(request) {
            Ok(response) if response.ok() => {
                self.persist(store, &identity, &response);
                Handled::new(response, ResponseSource::Network)
            }
            Ok(response) if response.is_server_error() => match cached {
                Some(snapshot) => {
                    warn!(url = %request.url, status = response.status, "api lane: serving stale snapshot");
                    Handled::new(snapshot.response, ResponseSource::StaleCache)
                }
                None => Handled::new(response, ResponseSource::Network),
            },
            Ok(response) => Handled::new(response, ResponseSource::Network),
            Err(e) => match cached {
                Some(snapshot) => {
                    warn!(url = %request.url, error = %e, "api lane: network failed, serving stale snapshot");
                    Handled::new(snapshot.response, ResponseSource::StaleCache)
                }
                None => {
                    warn!(url = %request.url, error = %e, "api lane: network failed, no snapshot");
                    Handled::new(HttpResponse::service_unavailable(), ResponseSource::Synthesized)
                }
            },
        }
    }

    fn static_lane(&self, request: &InterceptedRequest) -> Result<Handled, LaneError> {
        let store = &self.names.static_store;
        let identity = request.identity();

        let error = match self.network.fetch(request) {
            Ok(response) if response.ok() => {
                if self.is_genuine_asset(request, &response) {
                    self.persist(store, &identity, &response);
                }
                return Ok(Handled::new(response, ResponseSource::Network));
            }
            // A 5xx counts as a failed fetch; scripts still get the live answer.
            Ok(response) if response.is_server_error() && request.kind != ResourceKind::Script => {
                if let Some(handled) = self.static_fallback(request, store, &identity) {
                    warn!(url = %request.url, status = response.status, "static lane: server error, serving snapshot");
                    return Ok(handled);
                }
                return Ok(Handled::new(response, ResponseSource::Network));
            }
            Ok(response) => return Ok(Handled::new(response, ResponseSource::Network)),
            Err(e) => e,
        };

        // Never serve stale executable code.
        if request.kind == ResourceKind::Script {
            warn!(url = %request.url, error = %error, "static lane: script fetch failed");
            return Err(LaneError::Network {
                url: request.url.clone(),
                source: error,
            });
        }

        if let Some(handled) = self.static_fallback(request, store, &identity) {
            warn!(url = %request.url, error = %error, "static lane: network failed, serving snapshot");
            return Ok(handled);
        }

        warn!(url = %request.url, error = %error, "static lane: network failed, no snapshot");
        Ok(Handled::new(HttpResponse::service_unavailable(), ResponseSource::Synthesized))
    }

    /// Stored copy of the resource, or for documents the navigation fallback.
    fn static_fallback(
        &self,
        request: &InterceptedRequest,
        store: &str,
        identity: &RequestIdentity,
    ) -> Option<Handled> {
        if let Some(snapshot) = self.lookup(store, identity) {
            return Some(Handled::new(snapshot.response, ResponseSource::StaleCache));
        }
        if request.kind != ResourceKind::Document {
            return None;
        }
        let path = self.config.navigation_fallback.as_ref()?;
        let fallback = RequestIdentity::get(self.config.absolute_url(path));
        let snapshot = self.lookup(store, &fallback)?;
        debug!(url = %request.url, fallback = %fallback.url, "static lane: navigation fallback");
        Some(Handled::new(snapshot.response, ResponseSource::StaleCache))
    }

    fn image_lane(&self, request: &InterceptedRequest) -> Handled {
        let store = &self.names.dynamic_store;
        let identity = request.identity();

        if let Some(snapshot) = self.lookup(store, &identity) {
            return Handled::new(snapshot.response, ResponseSource::Cache);
        }

        match self.network.fetch(request) {
            Ok(response) => {
                if response.ok() {
                    self.persist(store, &identity, &response);
                }
                Handled::new(response, ResponseSource::Network)
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "image lane: network failed, no snapshot");
                let placeholder = match self.config.image_fallback {
                    ImageFallback::Unavailable => HttpResponse::service_unavailable(),
                    ImageFallback::EmptyOk => HttpResponse::empty_ok(),
                };
                Handled::new(placeholder, ResponseSource::Synthesized)
            }
        }
    }

    fn default_lane(&self, request: &InterceptedRequest) -> Result<Handled, LaneError> {
        self.network
            .fetch(request)
            .map(|response| Handled::new(response, ResponseSource::Network))
            .map_err(|source| LaneError::Network {
                url: request.url.clone(),
                source,
            })
    }

    /// Script/style URL that names a real asset, answered with something
    /// other than an HTML page.
    fn is_genuine_asset(&self, request: &InterceptedRequest, response: &HttpResponse) -> bool {
        if !matches!(request.kind, ResourceKind::Script | ResourceKind::Style) {
            return false;
        }
        let path = request.path().to_ascii_lowercase();
        let has_asset_extension = self
            .config
            .asset_extensions
            .iter()
            .any(|ext| path.ends_with(&ext.to_ascii_lowercase()));
        let is_html = response
            .header("content-type")
            .map(|ct| ct.to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false);
        has_asset_extension && !is_html
    }

    fn lookup(&self, store: &str, identity: &RequestIdentity) -> Option<StoredResponse> {
        match self.storage.match_entry(store, identity) {
            Ok(found) => found,
            Err(e) => {
                warn!(store, key = %identity, error = %e, "cache read failed");
                None
            }
        }
    }

    fn persist(&self, store: &str, identity: &RequestIdentity, response: &HttpResponse) {
        let snapshot = StoredResponse::capture(response.clone(), self.clock.now());
        if let Err(e) = self.storage.put(store, identity, snapshot) {
            warn!(store, key = %identity, error = %e, "cache write failed");
        }
    }
}
