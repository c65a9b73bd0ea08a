//! Generation install/activate and store rollover.

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{active_worker, shell_network, start_clock, url};
use edge_protocol::{HttpResponse, RequestIdentity, WorkerBroadcast};
use edge_worker::{
    CacheStorage, CacheWorker, DiskStorage, GenerationState, LifecycleError, MemoryStorage,
    StoredResponse, WorkerConfig,
};
use tempfile::TempDir;

fn seed(storage: &dyn CacheStorage, store: &str) {
    storage
        .put(
            store,
            &RequestIdentity::get(url("/old.js")),
            StoredResponse::capture(HttpResponse::new(200, "old"), Utc::now()),
        )
        .unwrap();
}

#[test]
fn test_activate_leaves_only_current_stores() {
    let storage = MemoryStorage::new();
    seed(&storage, "petcare-static-v1");
    seed(&storage, "petcare-dynamic-v1");
    seed(&storage, "petcare-static-v0");
    seed(&storage, "unrelated-store");

    let config = WorkerConfig {
        version: 2,
        ..Default::default()
    };
    let worker = active_worker(config, &storage, &shell_network(), &start_clock());

    assert_eq!(worker.state(), GenerationState::Activated);
    assert_eq!(
        storage.keys().unwrap(),
        vec!["petcare-dynamic-v2", "petcare-static-v2"]
    );
}

#[test]
fn test_rollover_on_disk_survives_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let storage = DiskStorage::new(temp.path()).unwrap();
        seed(&storage, "petcare-static-v1");
        seed(&storage, "petcare-dynamic-v1");
    }

    let storage = DiskStorage::new(temp.path()).unwrap();
    let mut worker = CacheWorker::new(
        WorkerConfig {
            version: 2,
            ..Default::default()
        },
        Arc::new(storage),
        Arc::new(shell_network()),
        Arc::new(start_clock()),
    )
    .unwrap();
    worker.install().unwrap();
    let report = worker.activate().unwrap();
    assert_eq!(report.deleted, vec!["petcare-dynamic-v1", "petcare-static-v1"]);
    assert!(report.failed.is_empty());

    let reopened = DiskStorage::new(temp.path()).unwrap();
    assert_eq!(
        reopened.keys().unwrap(),
        vec!["petcare-dynamic-v2", "petcare-static-v2"]
    );
    assert_eq!(reopened.entry_count("petcare-static-v2").unwrap(), 3);
}

#[test]
fn test_install_is_all_or_nothing() {
    let storage = MemoryStorage::new();
    let network = shell_network();
    network.fail(&url("/manifest.json"));

    let mut worker = CacheWorker::new(
        WorkerConfig::default(),
        Arc::new(storage.clone()),
        Arc::new(network),
        Arc::new(start_clock()),
    )
    .unwrap();

    let err = worker.install().unwrap_err();
    assert!(matches!(err, LifecycleError::Precache { ref url, .. } if url.ends_with("/manifest.json")));
    assert_eq!(worker.state(), GenerationState::Redundant);
    assert!(storage.keys().unwrap().is_empty());
    assert!(worker.activate().is_err());
}

#[test]
fn test_activation_broadcasts_cache_updated() {
    let storage = MemoryStorage::new();
    let mut worker = CacheWorker::new(
        WorkerConfig::default(),
        Arc::new(storage),
        Arc::new(shell_network()),
        Arc::new(start_clock()),
    )
    .unwrap();
    let tab_a = worker.clients().subscribe("/owner/dashboard");
    let tab_b = worker.clients().subscribe("/groomer/dashboard");

    worker.install().unwrap();
    worker.activate().unwrap();

    let expected = WorkerBroadcast::CacheUpdated { version: Some(1) };
    assert_eq!(tab_a.try_recv(), Some(expected.clone()));
    assert_eq!(tab_b.try_recv(), Some(expected));
}

#[test]
fn test_requests_before_activation_bypass_lanes() {
    let storage = MemoryStorage::new();
    let network = shell_network();
    let api = url("/rest/v1/pets");
    network.respond(&api, HttpResponse::new(200, "[]"));

    let mut worker = CacheWorker::new(
        WorkerConfig::default(),
        Arc::new(storage.clone()),
        Arc::new(network.clone()),
        Arc::new(start_clock()),
    )
    .unwrap();
    worker.install().unwrap();

    let req = edge_protocol::InterceptedRequest::get(api.clone(), edge_protocol::ResourceKind::Unclassified);
    let fetched = worker.handle_fetch(&req).unwrap();
    assert!(fetched.selection.is_none());
    assert_eq!(storage.entry_count("petcare-dynamic-v1").unwrap(), 0);
}
