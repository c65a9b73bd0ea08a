//! Stock cleanup hooks over the cache stores.

use std::sync::Arc;
use std::time::Duration;

use edge_worker::{CacheStorage, Clock, StoreNames};
use tracing::{info, warn};

use super::StorageMonitor;

/// Cache maintenance run by storage alerts.
pub struct CacheCleanup {
    storage: Arc<dyn CacheStorage>,
    names: StoreNames,
    clock: Arc<dyn Clock>,
    max_age: Duration,
}

impl CacheCleanup {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        names: StoreNames,
        clock: Arc<dyn Clock>,
        max_age: Duration,
    ) -> Self {
        Self {
            storage,
            names,
            clock,
            max_age,
        }
    }

    /// Register `auto_cleanup` for emergencies and `optimize` for critical alerts.
    pub fn register(self, monitor: &StorageMonitor) {
        let cleanup = Arc::new(self);
        let emergency = Arc::clone(&cleanup);
        monitor.on_cleanup(move |_| {
            emergency.auto_cleanup();
        });
        monitor.on_optimize(move |_| {
            cleanup.optimize();
        });
    }

    /// Delete every cache store. Returns how many were deleted.
    pub fn auto_cleanup(&self) -> usize {
        let names = match self.storage.keys() {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "auto cleanup could not list stores");
                return 0;
            }
        };
        let mut deleted = 0;
        for name in names {
            match self.storage.delete(&name) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(store = %name, error = %e, "auto cleanup failed to delete store"),
            }
        }
        info!(deleted, "auto cleanup deleted cache stores");
        deleted
    }

    /// Drop dynamic-store snapshots older than the max age.
    pub fn optimize(&self) -> usize {
        let store = &self.names.dynamic_store;
        let entries = match self.storage.entries(store) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(store = %store, error = %e, "optimize could not read store");
                return 0;
            }
        };
        let now = self.clock.now();
        let mut removed = 0;
        for (identity, snapshot) in entries {
            if snapshot.age(now) < self.max_age {
                continue;
            }
            match self.storage.remove_entry(store, &identity) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %identity, error = %e, "optimize failed to remove entry"),
            }
        }
        info!(store = %store, removed, "optimize removed old snapshots");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use edge_protocol::{HttpResponse, RequestIdentity};
    use edge_worker::{ManualClock, MemoryStorage, StoredResponse};

    #[test]
    fn test_optimize_keeps_recent_snapshots() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap());
        let names = StoreNames::for_version("petcare", 1);
        let old = RequestIdentity::get("http://x/rest/v1/old");
        let fresh = RequestIdentity::get("http://x/rest/v1/fresh");

        storage
            .put(&names.dynamic_store, &old, StoredResponse::capture(HttpResponse::new(200, "o"), clock.now()))
            .unwrap();
        clock.advance(Duration::from_secs(7200));
        storage
            .put(&names.dynamic_store, &fresh, StoredResponse::capture(HttpResponse::new(200, "f"), clock.now()))
            .unwrap();

        let cleanup = CacheCleanup::new(
            Arc::new(storage.clone()),
            names.clone(),
            Arc::new(clock),
            Duration::from_secs(3600),
        );
        assert_eq!(cleanup.optimize(), 1);
        assert!(storage.match_entry(&names.dynamic_store, &old).unwrap().is_none());
        assert!(storage.match_entry(&names.dynamic_store, &fresh).unwrap().is_some());
    }

    #[test]
    fn test_auto_cleanup_deletes_everything() {
        let storage = MemoryStorage::new();
        storage.open("petcare-static-v1").unwrap();
        storage.open("petcare-dynamic-v1").unwrap();
        let cleanup = CacheCleanup::new(
            Arc::new(storage.clone()),
            StoreNames::for_version("petcare", 1),
            Arc::new(ManualClock::new(Utc::now())),
            Duration::from_secs(60),
        );
        assert_eq!(cleanup.auto_cleanup(), 2);
        assert!(storage.keys().unwrap().is_empty());
    }
}
