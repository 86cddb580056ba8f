//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use procura_core::ProcuraResult;
use procura_storage::{
    DataSource, InvalidationCoordinator, InvalidationReport, JsonStore, RemoteCachePeer,
    SchemaPageTargets, StorageMode,
};

use crate::cached_source::CachedSource;
use crate::config::ApiConfig;
use crate::remote::RemoteClient;
use crate::revalidate::HttpRevalidator;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Cached reads plus pass-through writes.
    ///
    /// Routes read through `source` unchanged; the loaders behind it are the
    /// same domains registered with `invalidation`.
    pub source: Arc<CachedSource>,
    pub invalidation: Arc<InvalidationCoordinator>,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// Open the data source the config's mode asks for and wire the cache
    /// and invalidation around it.
    pub async fn from_config(config: ApiConfig) -> ProcuraResult<Self> {
        match config.mode {
            StorageMode::Demo => {
                let store = JsonStore::open(&config.data_path).await?;
                tracing::info!(path = %config.data_path.display(), "Demo mode: serving flat JSON store");
                Self::assemble(Arc::new(store), None, config)
            }
            StorageMode::Remote => {
                let url = config.remote_url.clone().unwrap_or_default();
                let client = Arc::new(RemoteClient::new(&url, config.request_timeout)?);
                tracing::info!(remote_url = %url, "Remote mode: proxying peer");
                let peer: Arc<dyn RemoteCachePeer> = client.clone();
                Self::assemble(client, Some(peer), config)
            }
        }
    }

    /// Build the state around an already opened source.
    pub fn assemble(
        source: Arc<dyn DataSource>,
        remote: Option<Arc<dyn RemoteCachePeer>>,
        config: ApiConfig,
    ) -> ProcuraResult<Self> {
        let cached = Arc::new(CachedSource::new(Arc::clone(&source), config.cache.clone()));

        let mut coordinator = InvalidationCoordinator::new(config.mode)
            .with_plan(config.revalidation.clone());
        for domain in cached.domains() {
            coordinator = coordinator.with_domain(domain);
        }
        if let Some(url) = &config.revalidate_url {
            let revalidator = Arc::new(HttpRevalidator::new(url.as_str(), config.request_timeout)?);
            coordinator =
                coordinator.with_revalidator(revalidator, Arc::new(SchemaPageTargets::new(source)));
        }
        if let Some(peer) = remote {
            coordinator = coordinator.with_remote(peer);
        }

        Ok(Self {
            source: cached,
            invalidation: Arc::new(coordinator),
            config: Arc::new(config),
            start_time: Instant::now(),
        })
    }

    /// Run a full invalidation after a write. Failures are already logged by
    /// the coordinator and never fail the write.
    pub async fn invalidate(&self) -> InvalidationReport {
        self.invalidation.clear_all().await
    }
}

crate::impl_from_ref!(Arc<CachedSource>, source);
crate::impl_from_ref!(Arc<InvalidationCoordinator>, invalidation);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(Instant, start_time);
