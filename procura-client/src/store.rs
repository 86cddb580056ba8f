//! Persistent client store.
//!
//! A JSON document mapping cache keys to `{ value, stored_at }`. Loaded once
//! at construction and rewritten in full after every change. A missing file
//! is an empty store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::ClientResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: Value,
    pub stored_at: DateTime<Utc>,
}

impl StoredValue {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        (Utc::now() - self.stored_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Fresh iff stored less than `ttl` ago.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

pub struct PersistentClientStore {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, StoredValue>>,
}

impl PersistentClientStore {
    pub async fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "Client store loaded");
        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.read().await.get(key).cloned()
    }

    /// Store `value` under `key`, stamped now.
    pub async fn put(&self, key: &str, value: Value) -> ClientResult<StoredValue> {
        let stored = StoredValue::new(value);
        self.insert(key, stored.clone()).await?;
        Ok(stored)
    }

    /// Store an already stamped value.
    pub async fn insert(&self, key: &str, stored: StoredValue) -> ClientResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), stored);
        self.flush(&entries).await
    }

    pub async fn remove(&self, key: &str) -> ClientResult<bool> {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(key).is_some();
        if removed {
            self.flush(&entries).await?;
        }
        Ok(removed)
    }

    /// Drop every entry. Returns how many were removed.
    pub async fn clear(&self) -> ClientResult<usize> {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        self.flush(&entries).await?;
        Ok(count)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn flush(&self, entries: &BTreeMap<String, StoredValue>) -> ClientResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let contents = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }
}
