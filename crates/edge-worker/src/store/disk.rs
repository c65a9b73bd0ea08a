//! Directory-backed cache storage.
//!
//! Layout: `<root>/<store>/<sha256(METHOD url)>.json`, one record per entry.
//! Writes go to a dot-prefixed temp file in the same directory and are
//! renamed into place, so readers see either the old or the new record.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use edge_protocol::RequestIdentity;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{validate_store_name, CacheStorage, StoreError, StoreResult, StoredResponse};

/// On-disk record for one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct DiskRecord {
    identity: RequestIdentity,
    #[serde(flatten)]
    snapshot: StoredResponse,
}

/// Cache storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
    quota: Option<u64>,
}

impl DiskStorage {
    /// Open (creating if needed) a storage root.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, quota: None })
    }

    /// Reject puts that would grow usage past `quota` bytes.
    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, name: &str) -> StoreResult<PathBuf> {
        validate_store_name(name)?;
        Ok(self.root.join(name))
    }

    fn entry_path(&self, name: &str, identity: &RequestIdentity) -> StoreResult<PathBuf> {
        Ok(self
            .store_dir(name)?
            .join(format!("{}.json", identity.digest())))
    }

    fn read_record(path: &Path) -> StoreResult<DiskRecord> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            location: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn file_len(path: &Path) -> u64 {
        fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }
}

impl CacheStorage for DiskStorage {
    fn open(&self, name: &str) -> StoreResult<()> {
        fs::create_dir_all(self.store_dir(name)?)?;
        Ok(())
    }

    fn match_entry(
        &self,
        name: &str,
        identity: &RequestIdentity,
    ) -> StoreResult<Option<StoredResponse>> {
        let path = self.entry_path(name, identity)?;
        if !path.exists() {
            return Ok(None);
        }
        let record = Self::read_record(&path)?;
        if &record.identity != identity {
            // Digest collision or a record written for another key.
            return Ok(None);
        }
        Ok(Some(record.snapshot))
    }

    fn put(
        &self,
        name: &str,
        identity: &RequestIdentity,
        snapshot: StoredResponse,
    ) -> StoreResult<()> {
        let path = self.entry_path(name, identity)?;
        let record = DiskRecord {
            identity: identity.clone(),
            snapshot,
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| {
            StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize cache record: {}", e),
            ))
        })?;

        if let Some(quota) = self.quota {
            let used = self.usage_bytes()?.saturating_sub(Self::file_len(&path));
            let needed = bytes.len() as u64;
            if used + needed > quota {
                return Err(StoreError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }

        atomic_write(&path, &bytes)?;
        Ok(())
    }

    fn remove_entry(&self, name: &str, identity: &RequestIdentity) -> StoreResult<bool> {
        let path = self.entry_path(name, identity)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, name: &str) -> StoreResult<bool> {
        let dir = self.store_dir(name)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_store_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn entries(&self, name: &str) -> StoreResult<Vec<(RequestIdentity, StoredResponse)>> {
        let dir = self.store_dir(name)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !is_record_file(&path) {
                continue;
            }
            match Self::read_record(&path) {
                Ok(record) => out.push((record.identity, record.snapshot)),
                Err(e) => tracing::warn!("skipping unreadable cache entry: {}", e),
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn usage_bytes(&self) -> StoreResult<u64> {
        let mut total = 0u64;
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                total += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(total)
    }

    fn quota_bytes(&self) -> Option<u64> {
        self.quota
    }

    fn entry_count(&self, name: &str) -> StoreResult<usize> {
        let dir = self.store_dir(name)?;
        if !dir.exists() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in fs::read_dir(&dir)? {
            if is_record_file(&entry?.path()) {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn is_record_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    !hidden && path.extension().and_then(|e| e.to_str()) == Some("json")
}

/// Write `bytes` to `path` via a unique temp file and rename.
fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("entry");
    let tmp_path = path.with_file_name(format!(".{}.tmp.{}", file_name, ulid::Ulid::new()));

    let result = (|| -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
