//! Shared test doubles for the worker integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use edge_protocol::{HttpResponse, InterceptedRequest};
use edge_worker::{CacheWorker, ManualClock, MemoryStorage, Network, NetworkError, WorkerConfig};

/// Network double: answers per URL, counts calls per URL.
#[derive(Clone, Default)]
pub struct ScriptedNetwork {
    routes: Arc<Mutex<BTreeMap<String, Result<HttpResponse, NetworkError>>>>,
    calls: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: HttpResponse) {
        self.routes.lock().unwrap().insert(url.to_string(), Ok(response));
    }

    pub fn fail(&self, url: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(NetworkError::Unreachable(url.to_string())));
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl Network for ScriptedNetwork {
    fn fetch(&self, request: &InterceptedRequest) -> Result<HttpResponse, NetworkError> {
        *self.calls.lock().unwrap().entry(request.url.clone()).or_insert(0) += 1;
        self.routes
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Err(NetworkError::Unreachable(request.url.clone())))
    }
}

pub const ORIGIN: &str = "http://localhost:3000";

pub fn url(path: &str) -> String {
    format!("{}{}", ORIGIN, path)
}

/// Network with the default precache shell available.
pub fn shell_network() -> ScriptedNetwork {
    let network = ScriptedNetwork::new();
    network.respond(&url("/"), HttpResponse::new(200, "<html>root</html>").with_header("content-type", "text/html"));
    network.respond(&url("/index.html"), HttpResponse::new(200, "<html>shell</html>").with_header("content-type", "text/html"));
    network.respond(&url("/manifest.json"), HttpResponse::new(200, "{}").with_header("content-type", "application/json"));
    network
}

pub fn start_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap())
}

/// Installed and activated worker over shared memory storage.
pub fn active_worker(
    config: WorkerConfig,
    storage: &MemoryStorage,
    network: &ScriptedNetwork,
    clock: &ManualClock,
) -> CacheWorker {
    let mut worker = CacheWorker::new(
        config,
        Arc::new(storage.clone()),
        Arc::new(network.clone()),
        Arc::new(clock.clone()),
    )
    .unwrap();
    worker.install().unwrap();
    worker.activate().unwrap();
    worker
}
