//! Client read-through cache strategies.
//!
//! Every GET goes through the strategy its endpoint resolves to:
//! `pre_request` may answer from the persistent store (the network call is
//! then skipped) or rewrite the request; `post_request` may persist and
//! transform the response. Writes never reach a strategy.

use async_trait::async_trait;
use procura_core::{normalize_records, Entity};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{StrategyRule, StrategyKind};
use crate::error::{ClientError, ClientResult};
use crate::store::PersistentClientStore;

/// Query parameter carrying the stored timestamp on delta requests.
pub const SINCE_PARAM: &str = "since";

// ============================================================================
// REQUEST CONTEXT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Store key: the endpoint plus its sorted query string.
    pub fn cache_key(&self) -> String {
        if self.params.is_empty() {
            return self.endpoint.clone();
        }
        let query: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", self.endpoint, query.join("&"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreRequestResult {
    /// True when `data` answers the request and the network call is skipped.
    pub hit: bool,
    pub data: Option<Value>,
    pub override_endpoint: Option<String>,
    pub override_params: Option<BTreeMap<String, String>>,
}

impl PreRequestResult {
    pub fn miss() -> Self {
        Self::default()
    }

    pub fn hit(data: Value) -> Self {
        Self {
            hit: true,
            data: Some(data),
            ..Self::default()
        }
    }
}

// ============================================================================
// STRATEGY TRAIT
// ============================================================================

#[async_trait]
pub trait ClientCacheStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn pre_request(
        &self,
        ctx: &RequestContext,
        store: &PersistentClientStore,
    ) -> ClientResult<PreRequestResult>;

    async fn post_request(
        &self,
        ctx: &RequestContext,
        response: Value,
        pre: &PreRequestResult,
        store: &PersistentClientStore,
    ) -> ClientResult<Value>;
}

/// Identity: never reads or writes the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

#[async_trait]
impl ClientCacheStrategy for PassThrough {
    fn name(&self) -> &'static str {
        "pass_through"
    }

    async fn pre_request(
        &self,
        _ctx: &RequestContext,
        _store: &PersistentClientStore,
    ) -> ClientResult<PreRequestResult> {
        Ok(PreRequestResult::miss())
    }

    async fn post_request(
        &self,
        _ctx: &RequestContext,
        response: Value,
        _pre: &PreRequestResult,
        _store: &PersistentClientStore,
    ) -> ClientResult<Value> {
        Ok(response)
    }
}

/// Serve a stored value while it is younger than `ttl`; persist every
/// network response.
#[derive(Debug, Clone, Copy)]
pub struct PersistentTtl {
    pub ttl: Duration,
}

impl PersistentTtl {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

#[async_trait]
impl ClientCacheStrategy for PersistentTtl {
    fn name(&self) -> &'static str {
        "persistent_ttl"
    }

    async fn pre_request(
        &self,
        ctx: &RequestContext,
        store: &PersistentClientStore,
    ) -> ClientResult<PreRequestResult> {
        match store.get(&ctx.cache_key()).await {
            Some(stored) if stored.is_fresh(self.ttl) => Ok(PreRequestResult::hit(stored.value)),
            _ => Ok(PreRequestResult::miss()),
        }
    }

    async fn post_request(
        &self,
        ctx: &RequestContext,
        response: Value,
        pre: &PreRequestResult,
        store: &PersistentClientStore,
    ) -> ClientResult<Value> {
        if !pre.hit {
            store.put(&ctx.cache_key(), response.clone()).await?;
        }
        Ok(response)
    }
}

/// Like [`PersistentTtl`], but a stale record list is refreshed with a delta
/// request (`since=<stored_at>`) and the delta merged into it by record id.
#[derive(Debug, Clone, Copy)]
pub struct DeltaMerge {
    pub ttl: Duration,
}

impl DeltaMerge {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

#[async_trait]
impl ClientCacheStrategy for DeltaMerge {
    fn name(&self) -> &'static str {
        "delta_merge"
    }

    async fn pre_request(
        &self,
        ctx: &RequestContext,
        store: &PersistentClientStore,
    ) -> ClientResult<PreRequestResult> {
        let Some(stored) = store.get(&ctx.cache_key()).await else {
            return Ok(PreRequestResult::miss());
        };
        if stored.is_fresh(self.ttl) {
            return Ok(PreRequestResult::hit(stored.value));
        }
        if !stored.value.is_array() {
            return Ok(PreRequestResult::miss());
        }

        let mut params = ctx.params.clone();
        params.insert(SINCE_PARAM.to_string(), stored.stored_at.to_rfc3339());
        Ok(PreRequestResult {
            override_params: Some(params),
            ..PreRequestResult::miss()
        })
    }

    async fn post_request(
        &self,
        ctx: &RequestContext,
        response: Value,
        pre: &PreRequestResult,
        store: &PersistentClientStore,
    ) -> ClientResult<Value> {
        if pre.hit {
            return Ok(response);
        }
        let key = ctx.cache_key();

        let merged = match (&pre.override_params, store.get(&key).await) {
            (Some(_), Some(stored)) => match merge_by_id(stored.value, response.clone()) {
                Ok(merged) => merged,
                Err(err) => {
                    warn!(endpoint = %ctx.endpoint, error = %err, "Delta not mergeable, keeping full response");
                    response
                }
            },
            _ => response,
        };
        store.put(&key, merged.clone()).await?;
        Ok(merged)
    }
}

/// Apply `delta` to `base`: records with a known id are replaced in place,
/// new ids are appended in delta order.
pub fn merge_by_id(base: Value, delta: Value) -> ClientResult<Value> {
    let mut records = normalize_records(base)?;
    let changes = normalize_records(delta)?;
    debug!(base = records.len(), delta = changes.len(), "Merging delta");

    for change in changes {
        match records.iter_mut().find(|r| r.id == change.id) {
            Some(existing) => *existing = change,
            None => records.push(change),
        }
    }
    Ok(serde_json::to_value::<Vec<Entity>>(records)?)
}

// ============================================================================
// REGISTRY
// ============================================================================

struct Rule {
    pattern: String,
    regex: Regex,
    strategy: Arc<dyn ClientCacheStrategy>,
}

/// Endpoint patterns mapped to strategies. First match wins; unmatched
/// endpoints pass through.
pub struct StrategyRegistry {
    rules: Vec<Rule>,
    fallback: Arc<dyn ClientCacheStrategy>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Arc::new(PassThrough),
        }
    }

    pub fn from_rules(rules: &[StrategyRule]) -> ClientResult<Self> {
        rules.iter().try_fold(Self::new(), |registry, rule| {
            registry.with_rule(&rule.pattern, build_strategy(rule.strategy))
        })
    }

    pub fn with_rule(
        mut self,
        pattern: &str,
        strategy: Arc<dyn ClientCacheStrategy>,
    ) -> ClientResult<Self> {
        let regex = compile_pattern(pattern)?;
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            regex,
            strategy,
        });
        Ok(self)
    }

    /// The strategy for `endpoint`. Any query string is ignored.
    pub fn resolve(&self, endpoint: &str) -> Arc<dyn ClientCacheStrategy> {
        let path = endpoint.split('?').next().unwrap_or(endpoint);
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(path))
            .map(|rule| Arc::clone(&rule.strategy))
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn patterns(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.pattern.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub fn build_strategy(kind: StrategyKind) -> Arc<dyn ClientCacheStrategy> {
    match kind {
        StrategyKind::PassThrough => Arc::new(PassThrough),
        StrategyKind::PersistentTtl { ttl_secs } => {
            Arc::new(PersistentTtl::new(Duration::from_secs(ttl_secs)))
        }
        StrategyKind::DeltaMerge { ttl_secs } => Arc::new(DeltaMerge::new(Duration::from_secs(ttl_secs))),
    }
}

/// Compile a glob into an anchored regex. `*` matches within one path
/// segment, `**` across segments, `?` one non-slash character.
pub fn compile_pattern(pattern: &str) -> ClientResult<Regex> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| ClientError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
