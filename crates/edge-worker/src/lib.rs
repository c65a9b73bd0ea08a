//! Petcare Edge Cache Worker
//!
//! Intercepts page requests, routes each one to a lane (api, static, image,
//! default) and serves it from versioned cache stores or the network.
//!
//! This crate can be used in two modes:
//! - **Standalone binary**: `edge-worker serve` speaks line-delimited JSON on stdin/stdout
//! - **In-process library**: embedders and tests build a [`CacheWorker`] over
//!   any [`CacheStorage`], [`Network`] and [`Clock`]

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod lanes;
pub mod lifecycle;
pub mod network;
pub mod notify;
pub mod rpc;
pub mod store;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigFileError, ImageFallback, WorkerConfig};
pub use dispatcher::{dispatch, dispatch_message, ReplyPort};
pub use lanes::{Handled, LaneError, LaneHandler, ResponseSource};
pub use lifecycle::{
    ActivationReport, GenerationManager, GenerationState, InstallReport, LifecycleError, StoreNames,
};
pub use network::{HttpNetwork, Network, NetworkError, OfflineNetwork};
pub use notify::{ClientAction, ClientId, ClientRegistry, Subscription, UpdatePolicy};
pub use rpc::RpcHandler;
pub use store::{
    CacheStorage, DiskStorage, MemoryStorage, StoreError, StoreResult, StoredResponse,
};
pub use worker::{CacheWorker, Fetched, WorkerStatus};
