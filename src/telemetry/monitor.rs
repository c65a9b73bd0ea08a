//! The storage monitor service.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use edge_worker::clock::elapsed;
use edge_worker::{CacheStorage, Clock};
use globset::GlobSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::estimate::{compile_patterns, rough_area_bytes, KeyValueArea, StorageEstimator};
use super::report::{AlertLevel, AlertThresholds, StorageReport};
use super::{TelemetrySettings, TelemetryError};

type Hook = Arc<dyn Fn(&StorageReport) + Send + Sync>;
type Listener = Arc<dyn Fn(&StorageReport) + Send + Sync>;
type Listeners = BTreeMap<u64, Listener>;

/// External delivery of alerts (pager, analytics, ...).
pub trait AlertSink: Send + Sync {
    fn alert(&self, level: AlertLevel, report: &StorageReport);
}

/// Default sink: alerts only go to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn alert(&self, level: AlertLevel, report: &StorageReport) {
        info!(level = level.as_str(), percent = report.percent, "storage alert delivered to log sink");
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOutcome {
    pub report: StorageReport,
    /// Level reached by this report, if any.
    pub level: Option<AlertLevel>,
    /// Whether an alert actually fired (false while cooling down).
    pub fired: bool,
}

/// Measures storage and raises alerts.
///
/// Construct once and share behind an `Arc`; hooks and listeners are
/// registered on the instance.
pub struct StorageMonitor {
    estimator: Box<dyn StorageEstimator>,
    clock: Arc<dyn Clock>,
    thresholds: AlertThresholds,
    cooldown: Duration,
    cache_keys: GlobSet,
    storage: Option<Arc<dyn CacheStorage>>,
    local: Option<Box<dyn KeyValueArea>>,
    session: Option<Box<dyn KeyValueArea>>,
    sink: Box<dyn AlertSink>,
    last_alert: Mutex<Option<DateTime<Utc>>>,
    cleanup_hooks: Mutex<Vec<Hook>>,
    optimize_hooks: Mutex<Vec<Hook>>,
    listeners: Arc<Mutex<Listeners>>,
    next_listener: AtomicU64,
}

impl StorageMonitor {
    pub fn new(
        settings: &TelemetrySettings,
        estimator: Box<dyn StorageEstimator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TelemetryError> {
        let thresholds = settings.thresholds();
        thresholds.validate()?;
        Ok(Self {
            estimator,
            clock,
            thresholds,
            cooldown: settings.cooldown(),
            cache_keys: compile_patterns(&settings.cache_key_patterns)?,
            storage: None,
            local: None,
            session: None,
            sink: Box::new(LogSink),
            last_alert: Mutex::new(None),
            cleanup_hooks: Mutex::new(Vec::new()),
            optimize_hooks: Mutex::new(Vec::new()),
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_listener: AtomicU64::new(0),
        })
    }

    /// List cache stores from this backend in each report.
    pub fn with_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_local_area(mut self, area: Box<dyn KeyValueArea>) -> Self {
        self.local = Some(area);
        self
    }

    pub fn with_session_area(mut self, area: Box<dyn KeyValueArea>) -> Self {
        self.session = Some(area);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run on emergency alerts.
    pub fn on_cleanup(&self, hook: impl Fn(&StorageReport) + Send + Sync + 'static) {
        lock(&self.cleanup_hooks).push(Arc::new(hook));
    }

    /// Run on critical alerts.
    pub fn on_optimize(&self, hook: impl Fn(&StorageReport) + Send + Sync + 'static) {
        lock(&self.optimize_hooks).push(Arc::new(hook));
    }

    /// Receive every report. Dropping the handle unsubscribes.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StorageReport) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).insert(id, Arc::new(listener));
        ListenerHandle {
            id,
            listeners: Arc::clone(&self.listeners),
        }
    }

    pub fn last_alert(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_alert)
    }

    /// Measure once and act on the result.
    ///
    /// Returns `None` when the platform cannot estimate storage.
    pub fn poll(&self) -> Option<PollOutcome> {
        let Some(report) = self.measure() else {
            debug!("storage estimate unavailable, skipping poll");
            return None;
        };

        // Callbacks run outside the lock so they may (un)subscribe.
        let listeners: Vec<Listener> = lock(&self.listeners).values().cloned().collect();
        for listener in listeners {
            listener(&report);
        }

        let level = self.thresholds.level(report.percent);
        let fired = match level {
            Some(level) => self.raise(level, &report),
            None => false,
        };
        Some(PollOutcome {
            report,
            level,
            fired,
        })
    }

    fn measure(&self) -> Option<StorageReport> {
        let estimate = self.estimator.estimate()?;

        let caches = match &self.storage {
            Some(storage) => list_caches(storage.as_ref()),
            None => Vec::new(),
        };
        let local_bytes = self
            .local
            .as_deref()
            .map(|area| rough_area_bytes(area, &self.cache_keys))
            .unwrap_or(0);
        let session_bytes = self
            .session
            .as_deref()
            .map(|area| rough_area_bytes(area, &self.cache_keys))
            .unwrap_or(0);

        Some(StorageReport {
            usage: estimate.usage,
            quota: estimate.quota,
            percent: StorageReport::percent_of(estimate.usage, estimate.quota),
            caches,
            local_bytes,
            session_bytes,
            taken_at: self.clock.now(),
        })
    }

    /// Fire an alert unless cooling down. Returns whether it fired.
    fn raise(&self, level: AlertLevel, report: &StorageReport) -> bool {
        let now = self.clock.now();
        {
            let mut last = lock(&self.last_alert);
            if let Some(at) = *last {
                if elapsed(at, now) < self.cooldown {
                    debug!(level = level.as_str(), "storage alert suppressed by cooldown");
                    return false;
                }
            }
            *last = Some(now);
        }

        match level {
            AlertLevel::Emergency => {
                error!(percent = report.percent, usage = report.usage, quota = report.quota, "storage emergency, running cleanup");
                self.sink.alert(level, report);
                run_hooks(&self.cleanup_hooks, report);
            }
            AlertLevel::Critical => {
                warn!(percent = report.percent, usage = report.usage, quota = report.quota, "storage critical, optimizing caches");
                self.sink.alert(level, report);
                run_hooks(&self.optimize_hooks, report);
            }
            AlertLevel::Warning => {
                warn!(percent = report.percent, usage = report.usage, quota = report.quota, "storage usage high");
                self.sink.alert(level, report);
            }
        }
        true
    }
}

/// Subscription to storage reports. Unsubscribes on drop.
pub struct ListenerHandle {
    id: u64,
    listeners: Arc<Mutex<Listeners>>,
}

impl ListenerHandle {
    pub fn unsubscribe(self) {}
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        lock(&self.listeners).remove(&self.id);
    }
}

fn list_caches(storage: &dyn CacheStorage) -> Vec<(String, usize)> {
    let names = match storage.keys() {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "could not list cache stores");
            return Vec::new();
        }
    };
    names
        .into_iter()
        .map(|name| {
            let count = storage.entry_count(&name).unwrap_or_else(|e| {
                warn!(store = %name, error = %e, "could not count cache entries");
                0
            });
            (name, count)
        })
        .collect()
}

fn run_hooks(hooks: &Mutex<Vec<Hook>>, report: &StorageReport) {
    let hooks: Vec<Hook> = lock(hooks).clone();
    for hook in hooks {
        hook(report);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
