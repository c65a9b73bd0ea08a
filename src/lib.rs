//! Petcare Edge
//!
//! The edge layer of the pet-care marketplace: layered configuration, the
//! storage telemetry poller, the transactional messaging endpoints and
//! role-based routing. The request-interception cache itself lives in the
//! `edge-worker` crate and is re-exported here.

pub mod config;
pub mod messaging;
pub mod roles;
pub mod telemetry;

pub use config::{EdgeSettings, EffectiveConfig};
pub use edge_classifier::{Lane, LaneSelection, Selector};
pub use edge_worker::{CacheWorker, WorkerConfig};
pub use messaging::{Channel, MessagingEndpoint, Provider};
pub use roles::{GuardDecision, Role, RouteGuard};
pub use telemetry::{Poller, StorageMonitor, StorageReport};
