//! Read-through client gateway.
//!
//! Reads run through the strategy their endpoint resolves to. Writes bypass
//! the strategies and are followed by a full invalidation: the server cache
//! is cleared and the persistent client store emptied.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::rest::RestClient;
use crate::store::PersistentClientStore;
use crate::strategy::{RequestContext, StrategyRegistry};

pub struct CachedClient {
    rest: RestClient,
    registry: StrategyRegistry,
    store: Arc<PersistentClientStore>,
}

impl CachedClient {
    pub fn new(rest: RestClient, registry: StrategyRegistry, store: Arc<PersistentClientStore>) -> Self {
        Self {
            rest,
            registry,
            store,
        }
    }

    /// Build the REST client, the strategy registry, and the file-backed
    /// store from one config.
    pub async fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let rest = RestClient::from_config(config)?;
        let registry = StrategyRegistry::from_rules(&config.strategies)?;
        let store = PersistentClientStore::open(&config.store_path).await?;
        Ok(Self::new(rest, registry, Arc::new(store)))
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn store(&self) -> &Arc<PersistentClientStore> {
        &self.store
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub async fn get(&self, endpoint: &str) -> ClientResult<Value> {
        self.get_with(RequestContext::new(endpoint)).await
    }

    pub async fn get_with_params(
        &self,
        endpoint: &str,
        params: BTreeMap<String, String>,
    ) -> ClientResult<Value> {
        self.get_with(RequestContext {
            endpoint: endpoint.to_string(),
            params,
        })
        .await
    }

    async fn get_with(&self, ctx: RequestContext) -> ClientResult<Value> {
        let strategy = self.registry.resolve(&ctx.endpoint);
        let pre = strategy.pre_request(&ctx, &self.store).await?;

        if pre.hit {
            debug!(endpoint = %ctx.endpoint, strategy = strategy.name(), "Client cache hit");
            let data = pre.data.clone().unwrap_or(Value::Null);
            return strategy.post_request(&ctx, data, &pre, &self.store).await;
        }

        let endpoint = pre.override_endpoint.as_deref().unwrap_or(&ctx.endpoint);
        let params = pre.override_params.as_ref().unwrap_or(&ctx.params);
        let response = self.rest.get_json(endpoint, params).await?;
        strategy.post_request(&ctx, response, &pre, &self.store).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> ClientResult<Value> {
        self.write(Method::POST, endpoint, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> ClientResult<Value> {
        self.write(Method::PUT, endpoint, Some(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> ClientResult<Value> {
        self.write(Method::PATCH, endpoint, Some(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> ClientResult<Value> {
        self.write::<Value>(Method::DELETE, endpoint, None).await
    }

    async fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> ClientResult<Value> {
        let response = self.rest.send_json(method, endpoint, body).await?;
        if let Err(err) = self.invalidate().await {
            warn!(endpoint, error = %err, "Client store clear failed after write");
        }
        Ok(response)
    }

    /// Clear the server cache, then the client store. A failed server clear
    /// is logged; the client store is cleared regardless. Entries are gone
    /// from memory even when rewriting the store file fails.
    pub async fn invalidate(&self) -> ClientResult<usize> {
        if let Err(err) = self.rest.clear_server_cache().await {
            warn!(error = %err, "Server cache clear failed");
        }
        let removed = self.store.clear().await?;
        debug!(removed, "Client store cleared");
        Ok(removed)
    }
}
