use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use edge_protocol::RequestIdentity;

use super::{validate_store_name, CacheStorage, StoreError, StoreResult, StoredResponse};

type Stores = BTreeMap<String, BTreeMap<RequestIdentity, StoredResponse>>;

/// In-process cache storage. Clones share the same stores.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Stores>>,
    quota: Option<u64>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject puts that would grow usage past `quota` bytes.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            inner: Arc::default(),
            quota: Some(quota),
        }
    }

    fn usage_of(stores: &Stores) -> u64 {
        stores
            .values()
            .flat_map(|entries| entries.iter())
            .map(|(id, snap)| id.url.len() as u64 + snap.size_bytes())
            .sum()
    }
}

impl CacheStorage for MemoryStorage {
    fn open(&self, name: &str) -> StoreResult<()> {
        validate_store_name(name)?;
        let mut stores = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        stores.entry(name.to_string()).or_default();
        Ok(())
    }

    fn match_entry(
        &self,
        name: &str,
        identity: &RequestIdentity,
    ) -> StoreResult<Option<StoredResponse>> {
        let stores = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(stores.get(name).and_then(|s| s.get(identity)).cloned())
    }

    fn put(
        &self,
        name: &str,
        identity: &RequestIdentity,
        snapshot: StoredResponse,
    ) -> StoreResult<()> {
        validate_store_name(name)?;
        let mut stores = self.inner.write().map_err(|_| StoreError::Poisoned)?;

        if let Some(quota) = self.quota {
            let replaced = stores
                .get(name)
                .and_then(|s| s.get(identity))
                .map(|old| identity.url.len() as u64 + old.size_bytes())
                .unwrap_or(0);
            let used = Self::usage_of(&stores).saturating_sub(replaced);
            let needed = identity.url.len() as u64 + snapshot.size_bytes();
            if used + needed > quota {
                return Err(StoreError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }

        stores
            .entry(name.to_string())
            .or_default()
            .insert(identity.clone(), snapshot);
        Ok(())
    }

    fn remove_entry(&self, name: &str, identity: &RequestIdentity) -> StoreResult<bool> {
        let mut stores = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        Ok(stores
            .get_mut(name)
            .map(|s| s.remove(identity).is_some())
            .unwrap_or(false))
    }

    fn delete(&self, name: &str) -> StoreResult<bool> {
        let mut stores = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        Ok(stores.remove(name).is_some())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let stores = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(stores.keys().cloned().collect())
    }

    fn entries(&self, name: &str) -> StoreResult<Vec<(RequestIdentity, StoredResponse)>> {
        let stores = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(stores
            .get(name)
            .map(|s| s.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn usage_bytes(&self) -> StoreResult<u64> {
        let stores = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(Self::usage_of(&stores))
    }

    fn quota_bytes(&self) -> Option<u64> {
        self.quota
    }

    fn entry_count(&self, name: &str) -> StoreResult<usize> {
        let stores = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(stores.get(name).map(|s| s.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use edge_protocol::HttpResponse;

    fn snap(body: &str) -> StoredResponse {
        StoredResponse::capture(HttpResponse::new(200, body), Utc::now())
    }

    #[test]
    fn test_open_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.open("petcare-static-v1").unwrap();
        storage.open("petcare-static-v1").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["petcare-static-v1"]);
    }

    #[test]
    fn test_put_match_delete() {
        let storage = MemoryStorage::new();
        let id = RequestIdentity::get("https://petcare.test/a.js");
        storage.put("s1", &id, snap("a")).unwrap();
        assert_eq!(storage.match_entry("s1", &id).unwrap().unwrap().response.body, b"a");
        assert!(storage.match_entry("s2", &id).unwrap().is_none());
        assert!(storage.delete("s1").unwrap());
        assert!(!storage.delete("s1").unwrap());
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.open("shared").unwrap();
        assert_eq!(other.keys().unwrap(), vec!["shared"]);
    }

    #[test]
    fn test_quota_enforced() {
        let storage = MemoryStorage::with_quota(64);
        let id = RequestIdentity::get("/x");
        let big = StoredResponse {
            response: HttpResponse::new(200, vec![0u8; 100]),
            captured_at: Utc::now(),
        };
        let err = storage.put("s", &id, big).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert!(storage.match_entry("s", &id).unwrap().is_none());
    }
}
