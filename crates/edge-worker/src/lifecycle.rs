//! Cache generation lifecycle
//!
//! Generation states: PARSED → INSTALLING → INSTALLED → ACTIVATING → ACTIVATED
//! with REDUNDANT when install fails.
//!
//! Install precaches the shell into the static store, all-or-nothing.
//! Activate retires every store whose name is not one of the two current
//! names, then claims the clients.

use edge_protocol::{InterceptedRequest, RequestIdentity, ResourceKind};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::WorkerConfig;
use crate::network::Network;
use crate::store::{CacheStorage, StoreError, StoredResponse};

/// The two store names of one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreNames {
    pub static_store: String,
    pub dynamic_store: String,
}

impl StoreNames {
    pub fn for_version(prefix: &str, version: u32) -> Self {
        Self {
            static_store: format!("{}-static-v{}", prefix, version),
            dynamic_store: format!("{}-dynamic-v{}", prefix, version),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        name == self.static_store || name == self.dynamic_store
    }
}

/// Generation state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationState {
    /// Registered but not yet installing
    Parsed,
    /// Precache in progress
    Installing,
    /// Precache done, waiting to activate
    Installed,
    /// Retiring old stores
    Activating,
    /// Controls clients and intercepts requests
    Activated,
    /// Install failed; this generation will never activate
    Redundant,
}

impl GenerationState {
    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: GenerationState) -> bool {
        match (self, target) {
            (GenerationState::Parsed, GenerationState::Installing) => true,

            (GenerationState::Installing, GenerationState::Installed) => true,
            (GenerationState::Installing, GenerationState::Redundant) => true,

            (GenerationState::Installed, GenerationState::Activating) => true,
            (GenerationState::Installed, GenerationState::Redundant) => true, // Superseded while waiting

            (GenerationState::Activating, GenerationState::Activated) => true,

            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Parsed => "PARSED",
            GenerationState::Installing => "INSTALLING",
            GenerationState::Installed => "INSTALLED",
            GenerationState::Activating => "ACTIVATING",
            GenerationState::Activated => "ACTIVATED",
            GenerationState::Redundant => "REDUNDANT",
        }
    }
}

/// Errors for generation lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid generation transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: GenerationState,
        to: GenerationState,
    },

    #[error("precache of {url} failed: {reason}")]
    Precache { url: String, reason: String },

    #[error("cache store error: {0}")]
    Store(#[from] StoreError),

    #[error("waiting for {0} client(s) of the previous generation to close")]
    WaitingForClients(usize),
}

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub version: u32,
    pub store: String,
    pub precached: Vec<String>,
    pub skip_waiting: bool,
}

/// Outcome of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    pub version: u32,
    /// Stale stores that were deleted.
    pub deleted: Vec<String>,
    /// Stale stores whose deletion failed, with the error.
    pub failed: Vec<(String, String)>,
}

/// Drives one cache generation through install and activate.
#[derive(Debug)]
pub struct GenerationManager {
    version: u32,
    names: StoreNames,
    precache: Vec<String>,
    state: GenerationState,
    skip_waiting: bool,
    skip_waiting_on_install: bool,
}

impl GenerationManager {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            version: config.version,
            names: StoreNames::for_version(&config.prefix, config.version),
            precache: config
                .precache
                .iter()
                .map(|path| config.absolute_url(path))
                .collect(),
            state: GenerationState::Parsed,
            skip_waiting: false,
            skip_waiting_on_install: config.skip_waiting_on_install,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn names(&self) -> &StoreNames {
        &self.names
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn is_activated(&self) -> bool {
        self.state == GenerationState::Activated
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    /// Ask to activate without waiting for older clients to close.
    pub fn skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    fn transition(&mut self, to: GenerationState) -> Result<(), LifecycleError> {
        if !self.state.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Precache every configured URL into the static store.
    ///
    /// Everything is fetched before anything is written; a single failed or
    /// non-OK fetch makes the generation redundant and leaves no entries.
    pub fn install(
        &mut self,
        storage: &dyn CacheStorage,
        network: &dyn Network,
        clock: &dyn Clock,
    ) -> Result<InstallReport, LifecycleError> {
        self.transition(GenerationState::Installing)?;
        info!(version = self.version, store = %self.names.static_store, "installing cache generation");

        let mut fetched = Vec::with_capacity(self.precache.len());
        for url in &self.precache {
            let request = InterceptedRequest::get(url.clone(), precache_kind(url));
            let outcome = match network.fetch(&request) {
                Ok(response) if response.ok() => Ok(response),
                Ok(response) => Err(format!("status {}", response.status)),
                Err(e) => Err(e.to_string()),
            };
            match outcome {
                Ok(response) => fetched.push((request.identity(), response)),
                Err(reason) => {
                    warn!(url = %url, reason = %reason, "precache failed");
                    self.state = GenerationState::Redundant;
                    return Err(LifecycleError::Precache {
                        url: url.clone(),
                        reason,
                    });
                }
            }
        }

        if let Err(e) = self.write_precache(storage, clock, fetched) {
            warn!(error = %e, "precache write failed; discarding static store");
            if let Err(cleanup) = storage.delete(&self.names.static_store) {
                warn!(error = %cleanup, "could not discard partial static store");
            }
            self.state = GenerationState::Redundant;
            return Err(e.into());
        }

        self.transition(GenerationState::Installed)?;
        if self.skip_waiting_on_install {
            self.skip_waiting = true;
        }

        Ok(InstallReport {
            version: self.version,
            store: self.names.static_store.clone(),
            precached: self.precache.clone(),
            skip_waiting: self.skip_waiting,
        })
    }

    fn write_precache(
        &self,
        storage: &dyn CacheStorage,
        clock: &dyn Clock,
        fetched: Vec<(RequestIdentity, edge_protocol::HttpResponse)>,
    ) -> Result<(), StoreError> {
        storage.open(&self.names.static_store)?;
        let now = clock.now();
        for (identity, response) in fetched {
            storage.put(
                &self.names.static_store,
                &identity,
                StoredResponse::capture(response, now),
            )?;
        }
        Ok(())
    }

    /// Retire stale stores and take control.
    ///
    /// `waiting_clients` is the number of clients still held by a previous
    /// generation; activation waits for them unless skip-waiting was asked.
    /// Deletion of stale stores is best-effort: failures are logged and
    /// reported, never fatal.
    pub fn activate(
        &mut self,
        storage: &dyn CacheStorage,
        waiting_clients: usize,
    ) -> Result<ActivationReport, LifecycleError> {
        if self.state == GenerationState::Installed && waiting_clients > 0 && !self.skip_waiting {
            return Err(LifecycleError::WaitingForClients(waiting_clients));
        }
        self.transition(GenerationState::Activating)?;

        let mut report = ActivationReport {
            version: self.version,
            ..Default::default()
        };

        match storage.keys() {
            Ok(names) => {
                for name in names.into_iter().filter(|n| !self.names.contains(n)) {
                    match storage.delete(&name) {
                        Ok(_) => {
                            info!(store = %name, "deleted stale cache store");
                            report.deleted.push(name);
                        }
                        Err(e) => {
                            warn!(store = %name, error = %e, "failed to delete stale cache store");
                            report.failed.push((name, e.to_string()));
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "could not enumerate cache stores"),
        }

        for name in [&self.names.static_store, &self.names.dynamic_store] {
            if let Err(e) = storage.open(name) {
                warn!(store = %name, error = %e, "failed to open current cache store");
            }
        }

        self.transition(GenerationState::Activated)?;
        info!(version = self.version, deleted = report.deleted.len(), "cache generation activated");
        Ok(report)
    }
}

/// Resource kind of a precache entry, inferred from its path.
fn precache_kind(url: &str) -> ResourceKind {
    let path = edge_protocol::http::url_path(url).to_ascii_lowercase();
    if path.ends_with('/') || path.ends_with(".html") || path.ends_with(".htm") {
        ResourceKind::Document
    } else if path.ends_with(".js") || path.ends_with(".mjs") {
        ResourceKind::Script
    } else if path.ends_with(".css") {
        ResourceKind::Style
    } else if [".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico"]
        .iter()
        .any(|ext| path.ends_with(ext))
    {
        ResourceKind::Image
    } else {
        ResourceKind::Unclassified
    }
}
