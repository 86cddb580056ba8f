//! Fan-out cache invalidation.
//!
//! One `clear_all()` call clears every registered [`CacheDomain`] and asks the
//! page renderer to revalidate every dynamic page, all concurrently. Failures
//! of individual steps are logged and itemized in the returned
//! [`InvalidationReport`]; they never fail the call. Once local work is done,
//! and only outside demo mode, the remote peer is told to clear as well.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use procura_core::{CompanyScope, InvalidationError, ProcuraResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::CacheDomain;
use crate::source::DataSource;

/// Where data comes from, which decides whether a remote peer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Local flat JSON store. The remote peer is never called.
    #[default]
    Demo,
    /// Data proxied from a remote service that keeps its own cache.
    Remote,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demo => f.write_str("demo"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "demo" => Ok(Self::Demo),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown storage mode '{}'", other)),
        }
    }
}

/// Re-renders one statically generated page.
#[async_trait]
pub trait PageRevalidator: Send + Sync {
    async fn revalidate(&self, path: &str) -> ProcuraResult<()>;
}

/// Lists the ids of dynamic resource pages that currently exist.
#[async_trait]
pub trait RevalidationTargets: Send + Sync {
    async fn resource_ids(&self) -> ProcuraResult<Vec<String>>;
}

/// The remote service's own cache.
#[async_trait]
pub trait RemoteCachePeer: Send + Sync {
    async fn clear_remote(&self) -> ProcuraResult<()>;
}

/// Revalidation targets read from a data source's schema list: one dynamic
/// page per schema.
pub struct SchemaPageTargets<S: ?Sized> {
    source: Arc<S>,
}

impl<S: ?Sized> SchemaPageTargets<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S> RevalidationTargets for SchemaPageTargets<S>
where
    S: DataSource + ?Sized,
{
    async fn resource_ids(&self) -> ProcuraResult<Vec<String>> {
        let schemas = self.source.list_schemas(&CompanyScope::unscoped()).await?;
        Ok(schemas.into_iter().map(|s| s.id.into_inner()).collect())
    }
}

/// Page paths to revalidate: `{page_prefix}/{id}` per known id, then
/// `base_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidationPlan {
    pub page_prefix: String,
    pub base_path: String,
}

impl Default for RevalidationPlan {
    fn default() -> Self {
        Self {
            page_prefix: "/resource".to_string(),
            base_path: "/".to_string(),
        }
    }
}

impl RevalidationPlan {
    pub fn page_path(&self, id: &str) -> String {
        format!("{}/{}", self.page_prefix.trim_end_matches('/'), id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainClearStatus {
    pub domain: String,
    pub cleared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries_removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRevalidationStatus {
    pub path: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one `clear_all()` call.
///
/// `success` is true whenever the coordinator ran to completion. `local` is
/// true iff every local domain cleared. `remote` is true iff the remote peer
/// was called and succeeded; it is false when the call was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationReport {
    pub success: bool,
    pub local: bool,
    pub remote: bool,
    pub mode: StorageMode,
    pub domains: Vec<DomainClearStatus>,
    pub revalidated: Vec<PageRevalidationStatus>,
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    failures: Vec<InvalidationError>,
}

impl InvalidationReport {
    /// Every step that failed, in the order the steps were gathered.
    pub fn failures(&self) -> &[InvalidationError] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn entries_removed(&self) -> usize {
        self.domains.iter().filter_map(|d| d.entries_removed).sum()
    }
}

/// Clears every registered cache domain on demand.
pub struct InvalidationCoordinator {
    mode: StorageMode,
    domains: Vec<Arc<dyn CacheDomain>>,
    revalidator: Option<Arc<dyn PageRevalidator>>,
    targets: Option<Arc<dyn RevalidationTargets>>,
    plan: RevalidationPlan,
    remote: Option<Arc<dyn RemoteCachePeer>>,
}

impl InvalidationCoordinator {
    pub fn new(mode: StorageMode) -> Self {
        Self {
            mode,
            domains: Vec::new(),
            revalidator: None,
            targets: None,
            plan: RevalidationPlan::default(),
            remote: None,
        }
    }

    pub fn with_domain(mut self, domain: Arc<dyn CacheDomain>) -> Self {
        self.domains.push(domain);
        self
    }

    pub fn with_revalidator(
        mut self,
        revalidator: Arc<dyn PageRevalidator>,
        targets: Arc<dyn RevalidationTargets>,
    ) -> Self {
        self.revalidator = Some(revalidator);
        self.targets = Some(targets);
        self
    }

    pub fn with_plan(mut self, plan: RevalidationPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_remote(mut self, peer: Arc<dyn RemoteCachePeer>) -> Self {
        self.remote = Some(peer);
        self
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn domain_names(&self) -> Vec<&str> {
        self.domains.iter().map(|d| d.name()).collect()
    }

    /// Clear everything. Never fails; see [`InvalidationReport`].
    pub async fn clear_all(&self) -> InvalidationReport {
        let mut warnings = Vec::new();
        let mut failures = Vec::new();

        let clears = join_all(self.domains.iter().map(|domain| async move {
            let name = domain.name().to_string();
            let result = domain.clear().await.map_err(|e| InvalidationError::DomainFailed {
                domain: name.clone(),
                reason: e.to_string(),
            });
            (name, result)
        }));
        let (clear_results, (page_results, target_warning)) =
            tokio::join!(clears, self.revalidate_pages());

        let domains: Vec<DomainClearStatus> = clear_results
            .into_iter()
            .map(|(domain, result)| match result {
                Ok(removed) => DomainClearStatus {
                    domain,
                    cleared: true,
                    entries_removed: Some(removed),
                    error: None,
                },
                Err(err) => {
                    warn!(domain = %domain, error = %err, "Cache domain failed to clear");
                    warnings.push(err.to_string());
                    let status = DomainClearStatus {
                        domain,
                        cleared: false,
                        entries_removed: None,
                        error: Some(err.to_string()),
                    };
                    failures.push(err);
                    status
                }
            })
            .collect();
        let local = domains.iter().all(|d| d.cleared);

        if let Some(warning) = target_warning {
            warnings.push(warning);
        }
        let revalidated: Vec<PageRevalidationStatus> = page_results
            .into_iter()
            .map(|(path, result)| match result {
                Ok(()) => PageRevalidationStatus {
                    path,
                    ok: true,
                    error: None,
                },
                Err(err) => {
                    warn!(path = %path, error = %err, "Page revalidation failed");
                    warnings.push(err.to_string());
                    let status = PageRevalidationStatus {
                        path,
                        ok: false,
                        error: Some(err.to_string()),
                    };
                    failures.push(err);
                    status
                }
            })
            .collect();

        let remote = match self.clear_remote().await {
            Ok(called) => called,
            Err(err) => {
                warn!(error = %err, "Remote cache clear failed");
                warnings.push(err.to_string());
                failures.push(err);
                false
            }
        };

        let report = InvalidationReport {
            success: true,
            local,
            remote,
            mode: self.mode,
            domains,
            revalidated,
            warnings,
            timestamp: Utc::now(),
            failures,
        };
        info!(
            mode = %self.mode,
            local = report.local,
            remote = report.remote,
            entries_removed = report.entries_removed(),
            failures = report.failures.len(),
            "Cache invalidated"
        );
        report
    }

    /// Dynamic pages first, concurrently, then the base path. Returns the
    /// per-path results and a warning when the id list was unavailable.
    async fn revalidate_pages(
        &self,
    ) -> (Vec<(String, Result<(), InvalidationError>)>, Option<String>) {
        let Some(revalidator) = &self.revalidator else {
            return (Vec::new(), None);
        };

        let mut warning = None;
        let ids = match &self.targets {
            Some(targets) => match targets.resource_ids().await {
                Ok(ids) => ids,
                Err(err) => {
                    warn!(error = %err, "Could not list pages to revalidate");
                    warning = Some(format!("Could not list pages to revalidate: {}", err));
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let revalidate = |path: String| {
            let revalidator = Arc::clone(revalidator);
            async move {
                let result = revalidator
                    .revalidate(&path)
                    .await
                    .map_err(|e| InvalidationError::RevalidationFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                (path, result)
            }
        };

        let mut results = join_all(ids.iter().map(|id| revalidate(self.plan.page_path(id)))).await;
        results.push(revalidate(self.plan.base_path.clone()).await);
        (results, warning)
    }

    /// `Ok(true)` when the peer was called and succeeded, `Ok(false)` when
    /// the call was skipped.
    async fn clear_remote(&self) -> Result<bool, InvalidationError> {
        if self.mode == StorageMode::Demo {
            debug!("Demo mode, skipping remote cache clear");
            return Ok(false);
        }
        let Some(peer) = &self.remote else {
            debug!("No remote cache peer configured");
            return Ok(false);
        };
        peer.clear_remote()
            .await
            .map(|()| true)
            .map_err(|e| InvalidationError::RemoteFailed {
                reason: e.to_string(),
            })
    }
}
