//! Read-through loader with per-key fetch coalescing.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use procura_core::{CacheError, ProcuraError, ProcuraResult};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::freshness::CacheRead;
use super::key::CacheKey;
use super::store::CacheStore;
use super::traits::{CacheDomain, CacheStats};

type SharedLoad<V> = Shared<BoxFuture<'static, ProcuraResult<V>>>;

struct InFlight<V> {
    ticket: u64,
    load: SharedLoad<V>,
}

struct LoaderInner<V> {
    domain: String,
    store: CacheStore<V>,
    in_flight: DashMap<CacheKey, InFlight<V>>,
    tickets: AtomicU64,
    fetches: AtomicU64,
}

/// Wraps fetch-on-miss with a [`CacheStore`].
///
/// Per key there is at most one fetch in flight: callers that miss while a
/// fetch is running await the same shared result. Failures are never cached;
/// the next call after a failure fetches again.
///
/// A load only writes its result if it is still the registered in-flight load
/// for its key when it finishes. [`clear`](Self::clear) and
/// [`clear_all`](Self::clear_all) drop registrations, so a fetch that was
/// already running when the cache was invalidated still answers its waiters
/// but cannot repopulate the cache with pre-invalidation data.
pub struct ResourceLoader<V> {
    inner: Arc<LoaderInner<V>>,
}

impl<V> Clone for ResourceLoader<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> ResourceLoader<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                domain: domain.into(),
                store: CacheStore::new(),
                in_flight: DashMap::new(),
                tickets: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
            }),
        }
    }

    pub fn domain(&self) -> &str {
        &self.inner.domain
    }

    /// Return the cached value for `key`, or run `fetcher` and cache its
    /// result for `ttl`.
    ///
    /// `fetcher` is only called when this caller starts a new load; it should
    /// do its work inside the returned future.
    pub async fn load<F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetcher: F,
    ) -> ProcuraResult<CacheRead<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProcuraResult<V>> + Send + 'static,
    {
        if let Some(read) = self.inner.store.get(&key) {
            return Ok(read);
        }

        let load = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(slot) => {
                debug!(domain = %self.inner.domain, key = %key, "Joining in-flight load");
                slot.get().load.clone()
            }
            Entry::Vacant(slot) => {
                // A load may have finished between the miss above and taking the slot.
                if let Some(read) = self.inner.store.peek(&key) {
                    return Ok(read);
                }
                let ticket = self.inner.tickets.fetch_add(1, Ordering::Relaxed);
                let load = self.start(key.clone(), ticket, ttl, fetcher());
                slot.insert(InFlight {
                    ticket,
                    load: load.clone(),
                });
                load
            }
        };

        load.await.map(CacheRead::from_fetch)
    }

    fn start<Fut>(&self, key: CacheKey, ticket: u64, ttl: Duration, fetch: Fut) -> SharedLoad<V>
    where
        Fut: Future<Output = ProcuraResult<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.fetches.fetch_add(1, Ordering::Relaxed);
            let result = fetch.await;

            let mut written = false;
            if let Entry::Occupied(slot) = inner.in_flight.entry(key.clone()) {
                if slot.get().ticket == ticket {
                    if let Ok(value) = &result {
                        inner.store.insert(key.clone(), value.clone(), ttl);
                        written = true;
                    }
                    slot.remove();
                }
            }

            match result {
                Ok(value) => {
                    if !written {
                        debug!(
                            domain = %inner.domain,
                            key = %key,
                            "Discarding load that finished after invalidation"
                        );
                    }
                    Ok(value)
                }
                Err(err) => {
                    warn!(domain = %inner.domain, key = %key, error = %err, "Cache fill failed");
                    Err(fetch_failure(&key, err))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// The cached value for `key`, without fetching.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.inner.store.get(key).map(CacheRead::into_value)
    }

    /// Drop one key and any load in flight for it.
    pub fn clear(&self, key: &CacheKey) -> bool {
        self.inner.in_flight.remove(key);
        self.inner.store.remove(key)
    }

    /// Drop every entry and every in-flight registration. Returns the number
    /// of entries removed.
    pub fn clear_all(&self) -> usize {
        self.inner.in_flight.clear();
        let removed = self.inner.store.clear();
        debug!(domain = %self.inner.domain, removed, "Cache domain cleared");
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// How many times a fetcher has actually run.
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.store.stats()
    }
}

/// Not-found passes through untouched so callers can still answer 404.
fn fetch_failure(key: &CacheKey, err: ProcuraError) -> ProcuraError {
    match err {
        err if err.is_not_found() => err,
        err @ ProcuraError::Cache(CacheError::FetchFailed { .. }) => err,
        err => CacheError::FetchFailed {
            key: key.to_string(),
            reason: err.to_string(),
        }
        .into(),
    }
}

#[async_trait]
impl<V> CacheDomain for ResourceLoader<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.domain()
    }

    async fn clear(&self) -> ProcuraResult<usize> {
        Ok(self.clear_all())
    }
}
