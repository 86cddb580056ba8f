//! Cache entries and the freshness metadata returned with every read.
//!
//! Entry validity is measured on the tokio clock so that TTL behaviour can be
//! tested with a paused runtime. The wall-clock `cached_at` is kept alongside
//! for reporting only.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// A cached value together with the moment it was stored and its TTL.
///
/// An entry is valid iff `now - inserted < ttl`. A zero TTL therefore never
/// produces a valid entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    value: T,
    cached_at: DateTime<Utc>,
    inserted: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            inserted: Instant::now(),
            ttl,
        }
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted) < self.ttl
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    /// Time left before the entry expires, zero once it has.
    pub fn remaining_ttl(&self) -> Duration {
        self.ttl
            .saturating_sub(Instant::now().saturating_duration_since(self.inserted))
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Result of a cache read, carrying staleness metadata.
///
/// Callers can tell a hit from a fresh fetch and how old the data is before
/// they unwrap the value.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    cached_at: DateTime<Utc>,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A read served from a valid cache entry.
    pub fn from_cache(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: true,
        }
    }

    /// A read served by calling the fetcher (cache miss).
    pub fn from_fetch(value: T) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    /// Wall-clock age of the data.
    pub fn staleness(&self) -> Duration {
        (Utc::now() - self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_exactly_at_ttl() {
        let entry = CacheEntry::new("v", Duration::from_secs(30));
        assert!(entry.is_valid());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(entry.is_valid());
        assert_eq!(entry.remaining_ttl(), Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!entry.is_valid());
        assert_eq!(entry.remaining_ttl(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_never_valid() {
        let entry = CacheEntry::new(1u32, Duration::ZERO);
        assert!(!entry.is_valid());
    }

    #[test]
    fn test_cache_read_map_keeps_metadata() {
        let cached_at = Utc::now();
        let read = CacheRead::from_cache(vec![1, 2, 3], cached_at);
        let mapped = read.map(|v| v.len());

        assert_eq!(*mapped.value(), 3);
        assert!(mapped.was_cache_hit());
        assert_eq!(mapped.cached_at(), cached_at);

        let fetched = CacheRead::from_fetch("x");
        assert!(fetched.was_cache_miss());
    }
}
