//! Client notifier
//!
//! The registry is a plain service object owned by the worker. Each open
//! client holds a [`Subscription`]; dropping it unsubscribes. Broadcasts are
//! fire-and-forget: a client whose receiver is gone is removed on the next
//! broadcast.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edge_protocol::WorkerBroadcast;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;
use ulid::Ulid;

/// Identifier of one open client (tab/window). Serialized as its ULID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(Ulid);

impl ClientId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ClientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ulid::from_string(&raw)
            .map(ClientId)
            .map_err(|e| serde::de::Error::custom(format!("invalid client id '{}': {}", raw, e)))
    }
}

struct Client {
    url: String,
    sender: Sender<WorkerBroadcast>,
}

type Clients = BTreeMap<ClientId, Client>;

/// Registry of open clients.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<Clients>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client opened at `url`.
    pub fn subscribe(&self, url: impl Into<String>) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        let id = ClientId::new();
        let url = url.into();
        debug!(client = %id, url = %url, "client subscribed");
        self.lock().insert(id, Client { url, sender });
        Subscription {
            id,
            receiver,
            clients: Arc::clone(&self.clients),
        }
    }

    /// Post a message to every open client. Returns how many received it.
    pub fn broadcast(&self, message: &WorkerBroadcast) -> usize {
        let mut clients = self.lock();
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, client) in clients.iter() {
            if client.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            clients.remove(&id);
        }
        delivered
    }

    /// Open clients with the URL each was opened at.
    pub fn clients(&self) -> Vec<(ClientId, String)> {
        self.lock()
            .iter()
            .map(|(id, c)| (*id, c.url.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Clients> {
        match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A client's end of the registry. Unsubscribes on drop.
pub struct Subscription {
    id: ClientId,
    receiver: Receiver<WorkerBroadcast>,
    clients: Arc<Mutex<Clients>>,
}

impl Subscription {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Next pending message, if any.
    pub fn try_recv(&self) -> Option<WorkerBroadcast> {
        match self.receiver.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerBroadcast> {
        match self.receiver.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Every pending message.
    pub fn drain(&self) -> Vec<WorkerBroadcast> {
        self.receiver.try_iter().collect()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        clients.remove(&self.id);
        debug!(client = %self.id, "client unsubscribed");
    }
}

/// What a client does when it hears a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAction {
    Ignore,
    Reload,
}

/// Client-side reaction to `CACHE_UPDATED`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePolicy {
    /// Reload the page when a new generation activates.
    pub reload_on_update: bool,
}

impl UpdatePolicy {
    pub fn on_broadcast(&self, message: &WorkerBroadcast) -> ClientAction {
        match message {
            WorkerBroadcast::CacheUpdated { .. } if self.reload_on_update => ClientAction::Reload,
            WorkerBroadcast::CacheUpdated { .. } => ClientAction::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_serializes_as_ulid_string() {
        let registry = ClientRegistry::new();
        let sub = registry.subscribe("https://petcare.test/");

        let json = serde_json::to_value(sub.id()).unwrap();
        assert_eq!(json.as_str().unwrap(), sub.id().to_string());
        assert_eq!(serde_json::from_value::<ClientId>(json).unwrap(), sub.id());
        assert!(serde_json::from_str::<ClientId>("\"not-a-ulid\"").is_err());
    }

    fn updated() -> WorkerBroadcast {
        WorkerBroadcast::CacheUpdated { version: Some(2) }
    }

    #[test]
    fn test_broadcast_reaches_every_client() {
        let registry = ClientRegistry::new();
        let a = registry.subscribe("/owner/dashboard");
        let b = registry.subscribe("/vet/dashboard");

        assert_eq!(registry.broadcast(&updated()), 2);
        assert_eq!(a.try_recv(), Some(updated()));
        assert_eq!(b.drain(), vec![updated()]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = ClientRegistry::new();
        let a = registry.subscribe("/");
        let b = registry.subscribe("/groomers");
        drop(a);
        assert_eq!(registry.len(), 1);
        b.unsubscribe();
        assert!(registry.is_empty());
        assert_eq!(registry.broadcast(&updated()), 0);
    }

    #[test]
    fn test_default_policy_does_not_reload() {
        assert_eq!(UpdatePolicy::default().on_broadcast(&updated()), ClientAction::Ignore);
        let eager = UpdatePolicy { reload_on_update: true };
        assert_eq!(eager.on_broadcast(&updated()), ClientAction::Reload);
    }
}
