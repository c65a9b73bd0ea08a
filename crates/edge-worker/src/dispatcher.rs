//! Operation and message dispatcher.
//!
//! Routes worker envelopes to the cache worker and cross-tab messages to
//! their handlers. Replies to `CLEAR_CACHE` and `GET_CACHE_STATS` go over the
//! caller's [`ReplyPort`] when one is given, and are also returned.

use std::sync::mpsc::Sender;

use edge_protocol::{
    names, ClearCacheReply, ClientMessage, ErrorCode, InterceptedRequest, WorkerError,
    WorkerRequest, WorkerResponse,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::lanes::LaneError;
use crate::lifecycle::LifecycleError;
use crate::worker::CacheWorker;

/// Dedicated reply channel of a request/response message.
pub type ReplyPort = Sender<Value>;

/// Handle one cross-tab message.
pub fn dispatch_message(
    worker: &mut CacheWorker,
    message: &ClientMessage,
    reply: Option<&ReplyPort>,
) -> Result<Value, WorkerError> {
    let payload = match message {
        ClientMessage::ClearCache => {
            let outcome = match worker.clear_all_stores() {
                Ok(_) => ClearCacheReply::succeeded(),
                Err(e) => {
                    warn!(error = %e, "CLEAR_CACHE failed");
                    ClearCacheReply::failed(e.to_string())
                }
            };
            to_value(&outcome)?
        }
        ClientMessage::SkipWaiting => {
            worker.skip_waiting();
            json!({ "skip_waiting": true })
        }
        ClientMessage::GetCacheStats => {
            let stats = worker
                .cache_stats()
                .map_err(|e| WorkerError::cache_failure(e.to_string()))?;
            to_value(&stats)?
        }
    };

    if let Some(port) = reply {
        if port.send(payload.clone()).is_err() {
            warn!(message = message.kind(), "reply port closed before reply was sent");
        }
    }
    Ok(payload)
}

/// Handle one worker envelope.
pub fn dispatch(worker: &mut CacheWorker, request: &WorkerRequest) -> WorkerResponse {
    let request_id = request.request_id.clone();
    let result = match request.op.as_str() {
        names::FETCH => handle_fetch(worker, &request.payload),
        names::MESSAGE => match ClientMessage::from_value(&request.payload) {
            Ok(message) => dispatch_message(worker, &message, None),
            Err(kind) => Err(WorkerError::unknown_message(&kind)),
        },
        names::INSTALL => worker
            .install()
            .map_err(lifecycle_error)
            .and_then(|report| to_value(&report)),
        names::ACTIVATE => worker
            .activate()
            .map_err(lifecycle_error)
            .and_then(|report| to_value(&report)),
        names::STATUS => to_value(&worker.status()),
        other => Err(WorkerError::unknown_operation(other)),
    };

    match result {
        Ok(payload) => WorkerResponse::success(request_id, payload),
        Err(error) => WorkerResponse::error(request_id, error),
    }
}

fn handle_fetch(worker: &CacheWorker, payload: &Value) -> Result<Value, WorkerError> {
    let request: InterceptedRequest = serde_json::from_value(payload.clone())
        .map_err(|e| WorkerError::invalid_request(format!("invalid fetch payload: {}", e)))?;
    match worker.handle_fetch(&request) {
        Ok(fetched) => to_value(&fetched),
        Err(LaneError::Network { url, source }) => {
            Err(WorkerError::network_failure(&url, &source.to_string()))
        }
    }
}

fn lifecycle_error(error: LifecycleError) -> WorkerError {
    match &error {
        LifecycleError::Precache { url, reason } => WorkerError::with_data(
            ErrorCode::InstallFailed,
            error.to_string(),
            json!({ "url": url, "reason": reason }),
        ),
        LifecycleError::Store(e) => WorkerError::cache_failure(e.to_string()),
        LifecycleError::InvalidTransition { from, .. } => WorkerError::not_activated(from.as_str()),
        LifecycleError::WaitingForClients(count) => WorkerError::with_data(
            ErrorCode::NotActivated,
            error.to_string(),
            json!({ "waiting_clients": count }),
        ),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, WorkerError> {
    serde_json::to_value(value)
        .map_err(|e| WorkerError::invalid_request(format!("failed to encode reply: {}", e)))
}
