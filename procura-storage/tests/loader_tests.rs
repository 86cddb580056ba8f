//! Loader behaviour under concurrency: coalescing, shared failures, and
//! invalidation racing an in-flight fetch.

use futures_util::future::join_all;
use procura_core::{ProcuraError, ProcuraResult, StorageError};
use procura_storage::{CacheKey, CacheRead, ResourceLoader};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(300);

fn slow_fetch(
    calls: Arc<AtomicUsize>,
    value: &'static str,
) -> impl FnOnce() -> futures_util::future::BoxFuture<'static, ProcuraResult<String>> {
    move || {
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(value.to_string())
        })
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_misses_share_one_fetch() -> ProcuraResult<()> {
    let loader = ResourceLoader::new("schemas");
    let calls = Arc::new(AtomicUsize::new(0));

    let loads = (0..16).map(|_| {
        loader.load(
            CacheKey::new("all"),
            TTL,
            slow_fetch(Arc::clone(&calls), "schemas-v1"),
        )
    });
    let results = join_all(loads).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(loader.fetch_count(), 1);
    for result in results {
        assert_eq!(result?.into_value(), "schemas-v1");
    }
    assert_eq!(loader.in_flight(), 0);

    let cached = loader
        .load(CacheKey::new("all"), TTL, slow_fetch(Arc::clone(&calls), "unused"))
        .await?;
    assert!(cached.was_cache_hit());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn distinct_keys_do_not_coalesce() -> ProcuraResult<()> {
    let loader = ResourceLoader::new("records");
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
        loader.load(CacheKey::new("vendors/V-1"), TTL, slow_fetch(Arc::clone(&calls), "a")),
        loader.load(CacheKey::new("vendors/V-2"), TTL, slow_fetch(Arc::clone(&calls), "b")),
    );
    assert_eq!(a?.into_value(), "a");
    assert_eq!(b?.into_value(), "b");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn coalesced_waiters_share_a_failure_and_the_next_call_retries() {
    let loader: ResourceLoader<String> = ResourceLoader::new("companies");
    let calls = Arc::new(AtomicUsize::new(0));

    let loads = (0..4).map(|_| {
        let calls = Arc::clone(&calls);
        loader.load(CacheKey::new("all"), TTL, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(ProcuraError::from(StorageError::Upstream {
                reason: "connection reset".to_string(),
            }))
        })
    });
    let results = join_all(loads).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| r.is_err()));
    assert!(loader.is_empty());

    let retried = loader
        .load(CacheKey::new("all"), TTL, slow_fetch(Arc::clone(&calls), "ok"))
        .await
        .map(CacheRead::into_value);
    assert_eq!(retried, Ok("ok".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn clear_during_fetch_is_not_undone() -> ProcuraResult<()> {
    let loader = ResourceLoader::new("resources");
    let calls = Arc::new(AtomicUsize::new(0));

    let pending = {
        let loader = loader.clone();
        let fetch = slow_fetch(Arc::clone(&calls), "before-clear");
        tokio::spawn(async move { loader.load(CacheKey::new("vendors"), TTL, fetch).await })
    };
    while loader.in_flight() == 0 {
        tokio::task::yield_now().await;
    }

    loader.clear_all();
    let late = pending
        .await
        .map_err(|e| ProcuraError::from(StorageError::Upstream { reason: e.to_string() }))??;

    // The waiter still gets its answer, but the cache stays empty.
    assert_eq!(late.into_value(), "before-clear");
    assert_eq!(loader.get(&CacheKey::new("vendors")), None);

    let fresh = loader
        .load(CacheKey::new("vendors"), TTL, slow_fetch(Arc::clone(&calls), "after-clear"))
        .await?;
    assert!(fresh.was_cache_miss());
    assert_eq!(fresh.into_value(), "after-clear");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn expired_entry_triggers_exactly_one_refetch() -> ProcuraResult<()> {
    let loader = ResourceLoader::new("schemas");
    let calls = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(30);

    loader
        .load(CacheKey::new("all"), ttl, slow_fetch(Arc::clone(&calls), "v1"))
        .await?;
    tokio::time::advance(ttl).await;

    let loads = (0..8).map(|_| {
        loader.load(CacheKey::new("all"), ttl, slow_fetch(Arc::clone(&calls), "v2"))
    });
    for result in join_all(loads).await {
        assert_eq!(result?.into_value(), "v2");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Within one TTL window every distinct key is fetched exactly once, no
    /// matter how the requests interleave.
    #[test]
    fn prop_one_fetch_per_distinct_key(keys in prop::collection::vec(0u8..6, 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let (fetches, served) = runtime.block_on(async {
            let loader = ResourceLoader::new("resources");
            let loads = keys.iter().map(|k| {
                let key = *k;
                loader.load(CacheKey::new(format!("k{}", key)), TTL, move || async move {
                    tokio::time::sleep(Duration::from_millis(u64::from(key))).await;
                    Ok(u32::from(key))
                })
            });
            let served: Vec<ProcuraResult<u32>> = join_all(loads)
                .await
                .into_iter()
                .map(|r| r.map(CacheRead::into_value))
                .collect();
            (loader.fetch_count(), served)
        });

        let distinct: HashSet<u8> = keys.iter().copied().collect();
        prop_assert_eq!(fetches, distinct.len() as u64);
        for (key, value) in keys.iter().zip(served) {
            prop_assert_eq!(value, Ok(u32::from(*key)));
        }
    }
}
