//! The cache worker: composition root for selector, lanes, lifecycle and
//! client registry.

use std::sync::Arc;

use edge_classifier::{LaneSelection, Selector, SelectorError};
use edge_protocol::{CacheStats, InterceptedRequest, StoreStats, WorkerBroadcast};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::WorkerConfig;
use crate::lanes::{Handled, LaneError, LaneHandler, ResponseSource};
use crate::lifecycle::{
    ActivationReport, GenerationManager, GenerationState, InstallReport, LifecycleError, StoreNames,
};
use crate::network::Network;
use crate::notify::ClientRegistry;
use crate::store::{CacheStorage, StoreResult};

/// A handled fetch plus the lane decision, if one was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fetched {
    /// `None` when the generation was not active and the request bypassed the lanes.
    pub selection: Option<LaneSelection>,
    #[serde(flatten)]
    pub handled: Handled,
}

/// Snapshot of the worker for the `status` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub version: u32,
    pub state: GenerationState,
    pub skip_waiting: bool,
    pub stores: StoreNames,
    pub clients: usize,
}

pub struct CacheWorker {
    config: WorkerConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
    selector: Selector,
    lanes: LaneHandler,
    generation: GenerationManager,
    clients: ClientRegistry,
}

impl CacheWorker {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SelectorError> {
        let selector = Selector::new(&config.selector)?;
        let generation = GenerationManager::new(&config);
        let lanes = LaneHandler::new(
            Arc::clone(&storage),
            Arc::clone(&network),
            Arc::clone(&clock),
            generation.names().clone(),
            config.clone(),
        );
        Ok(Self {
            config,
            storage,
            network,
            clock,
            selector,
            lanes,
            generation,
            clients: ClientRegistry::new(),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn state(&self) -> GenerationState {
        self.generation.state()
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            version: self.generation.version(),
            state: self.generation.state(),
            skip_waiting: self.generation.skip_waiting_requested(),
            stores: self.generation.names().clone(),
            clients: self.clients.len(),
        }
    }

    pub fn install(&mut self) -> Result<InstallReport, LifecycleError> {
        self.generation
            .install(self.storage.as_ref(), self.network.as_ref(), self.clock.as_ref())
    }

    /// Activate the generation and tell every open client.
    pub fn activate(&mut self) -> Result<ActivationReport, LifecycleError> {
        let report = self
            .generation
            .activate(self.storage.as_ref(), self.clients.len())?;
        let notified = self.clients.broadcast(&WorkerBroadcast::CacheUpdated {
            version: Some(report.version),
        });
        info!(version = report.version, notified, "broadcast CACHE_UPDATED");
        Ok(report)
    }

    pub fn skip_waiting(&mut self) {
        self.generation.skip_waiting();
    }

    pub fn select(&self, request: &InterceptedRequest) -> LaneSelection {
        self.selector.select(request)
    }

    /// Handle an intercepted request.
    ///
    /// Until the generation is activated requests go straight to the network.
    pub fn handle_fetch(&self, request: &InterceptedRequest) -> Result<Fetched, LaneError> {
        if !self.generation.is_activated() {
            debug!(url = %request.url, state = self.generation.state().as_str(), "not activated; passing through");
            let response = self
                .network
                .fetch(request)
                .map_err(|source| LaneError::Network {
                    url: request.url.clone(),
                    source,
                })?;
            return Ok(Fetched {
                selection: None,
                handled: Handled {
                    response,
                    source: ResponseSource::Network,
                },
            });
        }

        let selection = self.selector.select(request);
        debug!(url = %request.url, lane = %selection.lane, reason = %selection.reason.to_code(), "lane selected");
        let handled = self.lanes.handle(request, selection.lane)?;
        Ok(Fetched {
            selection: Some(selection),
            handled,
        })
    }

    /// Delete every cache store, returning how many existed.
    pub fn clear_all_stores(&self) -> StoreResult<usize> {
        let names = self.storage.keys()?;
        let mut deleted = 0;
        for name in &names {
            if self.storage.delete(name)? {
                deleted += 1;
            }
        }
        if deleted > 0 {
            warn!(deleted, "cleared all cache stores");
        }
        Ok(deleted)
    }

    pub fn cache_stats(&self) -> StoreResult<CacheStats> {
        let mut stores = Vec::new();
        for name in self.storage.keys()? {
            let entries = self.storage.entry_count(&name)?;
            stores.push(StoreStats { name, entries });
        }
        Ok(CacheStats {
            stores,
            usage_bytes: self.storage.usage_bytes()?,
            taken_at: self.clock.now(),
        })
    }
}
