//! # Key-Value Storage Port
//!
//! Persisted state (pairings, history records, expiry entries, pending
//! requests) goes through [`KeyValueStore`]. Keys are namespaced strings such
//! as `pairing:{topic}`; values are JSON-encoded bytes.
//!
//! Two adapters:
//!
//! - [`InMemoryKVStore`]: process-local, used by tests and ephemeral clients.
//! - [`FileBackedKVStore`]: keeps a full snapshot in memory and rewrites a
//!   JSON snapshot file atomically (temp file + rename) on every mutation.

use crate::errors::KVStoreError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl BatchOperation {
    pub fn put(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Abstract key-value store.
///
/// Implementations use interior mutability so a single store can be shared
/// (`Arc<dyn KeyValueStore>`) by every component of a client.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVStoreError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), KVStoreError>;

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVStoreError>;

    /// Either all operations are applied or none are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    fn exists(&self, key: &str) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// All entries whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVStoreError>;
}

// =============================================================================
// JSON helpers
// =============================================================================

pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, KVStoreError> {
    match store.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| KVStoreError::Serialization {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

pub fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), KVStoreError> {
    let bytes = serde_json::to_vec(value).map_err(|e| KVStoreError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.put(key, &bytes)
}

/// Decode every value under `prefix`. Entries that fail to decode are skipped
/// with a warning so one bad record cannot block a restore.
pub fn scan_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> Result<Vec<T>, KVStoreError> {
    let mut out = Vec::new();
    for (key, bytes) in store.prefix_scan(prefix)? {
        match serde_json::from_slice(&bytes) {
            Ok(value) => out.push(value),
            Err(e) => tracing::warn!(key = %key, error = %e, "[storage] skipping undecodable record"),
        }
    }
    Ok(out)
}

fn apply(data: &mut BTreeMap<String, Vec<u8>>, operations: Vec<BatchOperation>) {
    for op in operations {
        match op {
            BatchOperation::Put { key, value } => {
                data.insert(key, value);
            }
            BatchOperation::Delete { key } => {
                data.remove(&key);
            }
        }
    }
}

fn scan(data: &BTreeMap<String, Vec<u8>>, prefix: &str) -> Vec<(String, Vec<u8>)> {
    data.range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

// =============================================================================
// In-memory adapter
// =============================================================================

#[derive(Debug, Default)]
pub struct InMemoryKVStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KVStoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        apply(&mut self.data.write(), operations);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVStoreError> {
        Ok(scan(&self.data.read(), prefix))
    }
}

// =============================================================================
// File-backed adapter
// =============================================================================

/// File-backed key-value store.
///
/// The snapshot is a JSON object mapping keys to hex-encoded values. A
/// mutation is applied to a copy of the map, persisted, and only then
/// swapped in, so a failed write leaves both memory and disk unchanged.
#[derive(Debug)]
pub struct FileBackedKVStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
    path: PathBuf,
}

impl FileBackedKVStore {
    /// Open (or create on first write) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();
        let data = Self::load_from_file(&path)?;
        if data.is_empty() {
            tracing::info!(path = %path.display(), "[storage] 📁 starting with empty store");
        } else {
            tracing::info!(
                path = %path.display(),
                keys = data.len(),
                "[storage] 💾 loaded existing store"
            );
        }
        Ok(Self {
            data: RwLock::new(data),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_file(path: &Path) -> Result<BTreeMap<String, Vec<u8>>, KVStoreError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(KVStoreError::IOError {
                    message: e.to_string(),
                })
            }
        };
        let encoded: BTreeMap<String, String> =
            serde_json::from_slice(&raw).map_err(|e| KVStoreError::Corrupted(e.to_string()))?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                hex::decode(&v)
                    .map(|bytes| (k.clone(), bytes))
                    .map_err(|e| KVStoreError::Corrupted(format!("{k}: {e}")))
            })
            .collect()
    }

    fn save_to_file(&self, data: &BTreeMap<String, Vec<u8>>) -> Result<(), KVStoreError> {
        use std::io::Write;

        let io_err = |e: std::io::Error| KVStoreError::IOError {
            message: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let encoded: BTreeMap<&str, String> = data
            .iter()
            .map(|(k, v)| (k.as_str(), hex::encode(v)))
            .collect();
        let bytes = serde_json::to_vec_pretty(&encoded)
            .map_err(|e| KVStoreError::Corrupted(e.to_string()))?;

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, Vec<u8>>)) -> Result<(), KVStoreError> {
        let mut guard = self.data.write();
        let mut next = guard.clone();
        f(&mut next);
        self.save_to_file(&next)?;
        *guard = next;
        Ok(())
    }
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), KVStoreError> {
        self.mutate(|data| {
            data.insert(key.to_string(), value.to_vec());
        })
    }

    fn delete(&self, key: &str) -> Result<(), KVStoreError> {
        if !self.data.read().contains_key(key) {
            return Ok(());
        }
        self.mutate(|data| {
            data.remove(key);
        })
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.mutate(|data| apply(data, operations))
    }

    fn prefix_scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVStoreError> {
        Ok(scan(&self.data.read(), prefix))
    }
}
