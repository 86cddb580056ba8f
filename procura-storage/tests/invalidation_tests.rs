//! Invalidation fan-out across loaders, page revalidation, and the remote peer.

use async_trait::async_trait;
use procura_core::{InvalidationError, ProcuraError, ProcuraResult, SchemaDescriptor};
use procura_storage::{
    CacheDomain, CacheKey, InvalidationCoordinator, JsonStore, PageRevalidator, RemoteCachePeer,
    ResourceLoader, RevalidationPlan, SchemaPageTargets, StorageMode, StoreData,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingRevalidator {
    paths: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

#[async_trait]
impl PageRevalidator for RecordingRevalidator {
    async fn revalidate(&self, path: &str) -> ProcuraResult<()> {
        if let Ok(mut paths) = self.paths.lock() {
            paths.push(path.to_string());
        }
        match &self.fail_on {
            Some(bad) if bad == path => Err(ProcuraError::from(InvalidationError::RevalidationFailed {
                path: path.to_string(),
                reason: "renderer returned 500".to_string(),
            })),
            _ => Ok(()),
        }
    }
}

impl RecordingRevalidator {
    fn paths(&self) -> Vec<String> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[derive(Default)]
struct CountingPeer {
    calls: AtomicUsize,
}

#[async_trait]
impl RemoteCachePeer for CountingPeer {
    async fn clear_remote(&self) -> ProcuraResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn schema_store() -> Arc<JsonStore> {
    Arc::new(JsonStore::in_memory(
        StoreData::default()
            .with_schema(SchemaDescriptor::new("purchase_orders", "Purchase Orders"))
            .with_schema(SchemaDescriptor::new("vendors", "Vendors")),
    ))
}

async fn fill(loader: &ResourceLoader<u32>, keys: &[&str]) -> ProcuraResult<()> {
    for key in keys {
        loader
            .load(CacheKey::new(*key), Duration::from_secs(60), || async { Ok(1) })
            .await?;
    }
    Ok(())
}

#[tokio::test]
async fn clear_all_empties_every_domain_and_revalidates_each_page() -> ProcuraResult<()> {
    let schemas = Arc::new(ResourceLoader::new("schemas"));
    let companies = Arc::new(ResourceLoader::new("companies"));
    let resources = Arc::new(ResourceLoader::new("resources"));
    fill(&schemas, &["all"]).await?;
    fill(&companies, &["all"]).await?;
    fill(&resources, &["purchase_orders", "vendors"]).await?;

    let revalidator = Arc::new(RecordingRevalidator::default());
    let coordinator = InvalidationCoordinator::new(StorageMode::Demo)
        .with_domain(schemas.clone())
        .with_domain(companies.clone())
        .with_domain(resources.clone())
        .with_revalidator(revalidator.clone(), Arc::new(SchemaPageTargets::new(schema_store())))
        .with_plan(RevalidationPlan {
            page_prefix: "/resource".to_string(),
            base_path: "/".to_string(),
        });

    let report = coordinator.clear_all().await;
    assert!(report.success && report.local);
    assert!(report.is_clean());
    assert_eq!(report.entries_removed(), 4);
    for loader in [&schemas, &companies, &resources] {
        assert!(loader.is_empty(), "{} not cleared", loader.domain());
    }

    let paths = revalidator.paths();
    assert_eq!(paths.len(), 3);
    assert!(paths.contains(&"/resource/purchase_orders".to_string()));
    assert!(paths.contains(&"/resource/vendors".to_string()));
    assert_eq!(paths.last().map(String::as_str), Some("/"));
    Ok(())
}

#[tokio::test]
async fn second_clear_reports_nothing_new() -> ProcuraResult<()> {
    let schemas = Arc::new(ResourceLoader::new("schemas"));
    fill(&schemas, &["all"]).await?;
    let revalidator = Arc::new(RecordingRevalidator {
        fail_on: Some("/resource/vendors".to_string()),
        ..Default::default()
    });
    let coordinator = InvalidationCoordinator::new(StorageMode::Demo)
        .with_domain(schemas.clone())
        .with_revalidator(revalidator, Arc::new(SchemaPageTargets::new(schema_store())));

    let first = coordinator.clear_all().await;
    let second = coordinator.clear_all().await;

    assert!(first.local && second.local);
    assert_eq!(first.entries_removed(), 1);
    assert_eq!(second.entries_removed(), 0);
    assert!(schemas.is_empty());
    assert_eq!(first.failures(), second.failures());
    assert_eq!(second.failures().len(), 1);
    Ok(())
}

#[tokio::test]
async fn remote_peer_only_outside_demo_mode() {
    let demo_peer = Arc::new(CountingPeer::default());
    let demo = InvalidationCoordinator::new(StorageMode::Demo).with_remote(demo_peer.clone());
    let remote_peer = Arc::new(CountingPeer::default());
    let remote = InvalidationCoordinator::new(StorageMode::Remote).with_remote(remote_peer.clone());

    let demo_report = demo.clear_all().await;
    let remote_report = remote.clear_all().await;

    assert!(!demo_report.remote);
    assert!(remote_report.remote);
    assert_eq!(demo_peer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(remote_peer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn report_serializes_for_the_clear_endpoint() -> Result<(), Box<dyn std::error::Error>> {
    let loader: Arc<dyn CacheDomain> = Arc::new(ResourceLoader::<u32>::new("schemas"));
    let report = InvalidationCoordinator::new(StorageMode::Demo)
        .with_domain(loader)
        .clear_all()
        .await;

    let value = serde_json::to_value(&report)?;
    assert_eq!(value["success"], true);
    assert_eq!(value["local"], true);
    assert_eq!(value["remote"], false);
    assert_eq!(value["mode"], "demo");
    assert!(value["timestamp"].is_string());
    assert_eq!(value["domains"][0]["entriesRemoved"], 0);
    assert!(value.get("failures").is_none());
    Ok(())
}
