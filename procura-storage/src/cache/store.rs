//! Keyed TTL store backing one cache domain.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use super::freshness::{CacheEntry, CacheRead};
use super::key::CacheKey;
use super::traits::CacheStats;

/// Process-wide keyed TTL cache for one logical domain.
///
/// Expired entries are treated as absent and dropped the next time their key
/// is read; there is no background sweep. Writes are crate-private: a store is
/// only ever mutated by the [`ResourceLoader`](super::ResourceLoader) that
/// owns it.
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> CacheStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// The value under `key` if present and unexpired.
    pub fn get(&self, key: &CacheKey) -> Option<CacheRead<V>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_valid_at(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(CacheRead::from_cache(entry.value().value().clone(), entry.cached_at()));
            }
            Some(_) => true,
            None => false,
        };

        if expired && self.entries.remove_if(key, |_, entry| !entry.is_valid_at(now)).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Like [`get`](Self::get) but leaves statistics and expired entries alone.
    pub(crate) fn peek(&self, key: &CacheKey) -> Option<CacheRead<V>> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_valid())
            .map(|entry| CacheRead::from_cache(entry.value().value().clone(), entry.cached_at()))
    }

    pub(crate) fn insert(&self, key: CacheKey, value: V, ttl: Duration) {
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    pub(crate) fn remove(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry, returning how many were held.
    pub(crate) fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
