//! Background polling thread.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use super::{StorageMonitor, TelemetryError};

enum Signal {
    Poll,
    Stop,
}

/// Polls a monitor on an interval until stopped.
///
/// Polls once at start, then every `interval`, and immediately whenever
/// [`Poller::visibility_regained`] is called. Dropping the poller stops it.
pub struct Poller {
    signals: Sender<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn(monitor: Arc<StorageMonitor>, interval: Duration) -> Result<Self, TelemetryError> {
        if interval.is_zero() {
            return Err(TelemetryError::InvalidInterval(
                "poll interval must be > 0".to_string(),
            ));
        }
        let (signals, inbox) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("storage-poller".to_string())
            .spawn(move || {
                monitor.poll();
                loop {
                    match inbox.recv_timeout(interval) {
                        Ok(Signal::Poll) | Err(RecvTimeoutError::Timeout) => {
                            monitor.poll();
                        }
                        Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("storage poller stopped");
            })?;
        Ok(Self {
            signals,
            handle: Some(handle),
        })
    }

    /// The page became visible again; poll now.
    pub fn visibility_regained(&self) {
        let _ = self.signals.send(Signal::Poll);
    }

    /// Stop polling and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.signals.send(Signal::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
