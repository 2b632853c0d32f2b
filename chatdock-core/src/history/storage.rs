//! Key-value blob storage backends
//!
//! The store only needs two string blobs: the serialized session
//! collection and the active session id. Backends map keys to those
//! blobs and nothing more.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::utils::safe_filename;

/// Durable string blob storage keyed by name
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a blob; `Ok(None)` when the key was never written
    async fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Replace a blob
    async fn set(&self, key: &str, value: &str) -> crate::Result<()>;

    /// Remove a blob; removing a missing key is not an error
    async fn remove(&self, key: &str) -> crate::Result<()>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Directory-backed store, one file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// File backing `key`
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(safe_filename(key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        match tokio::fs::read(self.key_path(key)).await {
            // Undecodable bytes come back mangled so the caller can reject the
            // payload like any other malformed blob.
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(crate::Error::Storage(format!("read {}: {}", key, e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| crate::Error::Storage(format!("create {:?}: {}", self.dir, e)))?;

        let path = self.key_path(key);
        let tmp = self.dir.join(format!(".{}.tmp", safe_filename(key)));
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| crate::Error::Storage(format!("write {}: {}", key, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| crate::Error::Storage(format!("rename {}: {}", key, e)))?;

        debug!(key, bytes = value.len(), "Wrote blob to {:?}", path);
        Ok(())
    }

    async fn remove(&self, key: &str) -> crate::Result<()> {
        match tokio::fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(crate::Error::Storage(format!("remove {}: {}", key, e))),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Process-local store; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> crate::Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
