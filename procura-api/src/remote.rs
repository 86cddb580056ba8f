//! Remote peer client.
//!
//! In remote mode every read and write is proxied to a peer service that
//! speaks the same HTTP contracts as this server. The caller's scope is
//! forwarded in the `x-company-id` header, and cache clears are forwarded to
//! the peer's `/cache/clear`.

use async_trait::async_trait;
use procura_core::{
    normalize_companies, normalize_record, normalize_relation_groups, normalize_records,
    normalize_schema, normalize_schemas, Company, CompanyScope, Entity, ProcuraError, ProcuraResult,
    RecordId, RelationGroup, RelationLink, RelationQuery, SchemaDescriptor, SchemaId, StorageError,
};
use procura_storage::{DataSource, RemoteCachePeer};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::extractors::COMPANY_HEADER;

/// What the peer answered, once transport errors are ruled out.
enum Reply {
    Body(Value),
    NotFound,
    Conflict,
}

#[derive(Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    pub fn new(base_url: &str, timeout: Duration) -> ProcuraResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(upstream)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, scope: &CompanyScope, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.request(method, url);
        if scope == &CompanyScope::unscoped() {
            request
        } else {
            request.header(COMPANY_HEADER, scope.as_str())
        }
    }

    async fn send(&self, request: RequestBuilder) -> ProcuraResult<Reply> {
        let response = request.send().await.map_err(upstream)?;
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Ok(Reply::NotFound),
            StatusCode::CONFLICT => return Ok(Reply::Conflict),
            _ => {}
        }

        let text = response.text().await.map_err(upstream)?;
        if !status.is_success() {
            return Err(StorageError::Upstream {
                reason: format!("HTTP {}: {}", status.as_u16(), text),
            }
            .into());
        }
        if text.trim().is_empty() {
            return Ok(Reply::Body(Value::Null));
        }
        serde_json::from_str(&text).map(Reply::Body).map_err(|e| {
            StorageError::Upstream {
                reason: format!("invalid JSON from peer: {}", e),
            }
            .into()
        })
    }

    async fn get(&self, scope: &CompanyScope, path: &str) -> ProcuraResult<Reply> {
        debug!(path = %path, scope = %scope, "Remote GET");
        self.send(self.request(Method::GET, scope, path)).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        scope: &CompanyScope,
        path: &str,
        body: &B,
    ) -> ProcuraResult<Reply> {
        debug!(method = %method, path = %path, scope = %scope, "Remote write");
        self.send(self.request(method, scope, path).json(body)).await
    }
}

fn upstream(err: reqwest::Error) -> ProcuraError {
    StorageError::Upstream {
        reason: err.to_string(),
    }
    .into()
}

fn schema_missing(schema_id: &SchemaId) -> ProcuraError {
    StorageError::SchemaNotFound {
        schema: schema_id.to_string(),
    }
    .into()
}

fn record_missing(schema_id: &SchemaId, id: &RecordId) -> ProcuraError {
    StorageError::RecordNotFound {
        schema: schema_id.to_string(),
        id: id.to_string(),
    }
    .into()
}

fn unexpected_conflict(path: &str) -> ProcuraError {
    StorageError::Upstream {
        reason: format!("unexpected conflict from {}", path),
    }
    .into()
}

#[async_trait]
impl DataSource for RemoteClient {
    async fn list_schemas(&self, scope: &CompanyScope) -> ProcuraResult<Vec<SchemaDescriptor>> {
        match self.get(scope, "/schemas").await? {
            Reply::Body(value) => normalize_schemas(value),
            Reply::NotFound => Ok(Vec::new()),
            Reply::Conflict => Err(unexpected_conflict("/schemas")),
        }
    }

    async fn get_schema(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
    ) -> ProcuraResult<SchemaDescriptor> {
        let path = format!("/schema/{}", schema_id);
        match self.get(scope, &path).await? {
            Reply::Body(value) => normalize_schema(value),
            Reply::NotFound => Err(schema_missing(schema_id)),
            Reply::Conflict => Err(unexpected_conflict(&path)),
        }
    }

    async fn put_schema(&self, scope: &CompanyScope, schema: &SchemaDescriptor) -> ProcuraResult<()> {
        let path = format!("/schema/{}", schema.id);
        match self.send_json(Method::PUT, scope, &path, schema).await? {
            Reply::Body(_) => Ok(()),
            Reply::NotFound => Err(schema_missing(&schema.id)),
            Reply::Conflict => Err(unexpected_conflict(&path)),
        }
    }

    async fn list_companies(&self, scope: &CompanyScope) -> ProcuraResult<Vec<Company>> {
        match self.get(scope, "/companies").await? {
            Reply::Body(value) => normalize_companies(value),
            Reply::NotFound => Ok(Vec::new()),
            Reply::Conflict => Err(unexpected_conflict("/companies")),
        }
    }

    async fn list_records(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
    ) -> ProcuraResult<Vec<Entity>> {
        let path = format!("/resource/{}", schema_id);
        match self.get(scope, &path).await? {
            Reply::Body(value) => normalize_records(value),
            Reply::NotFound => Err(schema_missing(schema_id)),
            Reply::Conflict => Err(unexpected_conflict(&path)),
        }
    }

    async fn get_record(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
        id: &RecordId,
    ) -> ProcuraResult<Entity> {
        let path = format!("/resource/{}/{}", schema_id, id);
        match self.get(scope, &path).await? {
            Reply::Body(value) => normalize_record(value),
            Reply::NotFound => Err(record_missing(schema_id, id)),
            Reply::Conflict => Err(unexpected_conflict(&path)),
        }
    }

    async fn create_record(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
        attributes: Map<String, Value>,
    ) -> ProcuraResult<Entity> {
        let path = format!("/resource/{}", schema_id);
        let requested_id = attributes
            .get("id")
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()));
        match self.send_json(Method::POST, scope, &path, &attributes).await? {
            Reply::Body(value) => normalize_record(value),
            Reply::NotFound => Err(schema_missing(schema_id)),
            Reply::Conflict => Err(StorageError::RecordExists {
                schema: schema_id.to_string(),
                id: requested_id.unwrap_or_default(),
            }
            .into()),
        }
    }

    async fn update_record(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
        record: Entity,
    ) -> ProcuraResult<Entity> {
        let path = format!("/resource/{}/{}", schema_id, record.id);
        match self.send_json(Method::PUT, scope, &path, &record).await? {
            // Peers that answer with an empty body accepted the record as sent.
            Reply::Body(Value::Null) => Ok(record),
            Reply::Body(value) => normalize_record(value),
            Reply::NotFound => Err(record_missing(schema_id, &record.id)),
            Reply::Conflict => Err(unexpected_conflict(&path)),
        }
    }

    async fn delete_record(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
        id: &RecordId,
    ) -> ProcuraResult<()> {
        let path = format!("/resource/{}/{}", schema_id, id);
        match self.send(self.request(Method::DELETE, scope, &path)).await? {
            Reply::Body(_) => Ok(()),
            Reply::NotFound => Err(record_missing(schema_id, id)),
            Reply::Conflict => Err(unexpected_conflict(&path)),
        }
    }

    async fn relations(
        &self,
        scope: &CompanyScope,
        query: &RelationQuery,
    ) -> ProcuraResult<Vec<RelationGroup>> {
        let request = self.request(Method::GET, scope, "/relations").query(query);
        match self.send(request).await? {
            Reply::Body(value) => normalize_relation_groups(value),
            Reply::NotFound => Err(record_missing(&query.schema, &query.id)),
            Reply::Conflict => Err(unexpected_conflict("/relations")),
        }
    }

    async fn add_relation(&self, scope: &CompanyScope, link: &RelationLink) -> ProcuraResult<()> {
        match self.send_json(Method::POST, scope, "/relations", link).await? {
            Reply::Body(_) => Ok(()),
            Reply::NotFound => Err(record_missing(&link.source_schema, &link.source_id)),
            Reply::Conflict => Err(unexpected_conflict("/relations")),
        }
    }

    async fn health_check(&self) -> ProcuraResult<()> {
        match self.get(&CompanyScope::unscoped(), "/health/ping").await? {
            Reply::Body(_) => Ok(()),
            Reply::NotFound | Reply::Conflict => Err(StorageError::Upstream {
                reason: "peer health endpoint unavailable".to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl RemoteCachePeer for RemoteClient {
    async fn clear_remote(&self) -> ProcuraResult<()> {
        let request = self.request(Method::POST, &CompanyScope::unscoped(), "/cache/clear");
        match self.send(request).await? {
            Reply::Body(_) => Ok(()),
            Reply::NotFound | Reply::Conflict => Err(StorageError::Upstream {
                reason: "peer has no cache clear endpoint".to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_trimmed() -> ProcuraResult<()> {
        let client = RemoteClient::new("https://erp.example.com/api/", Duration::from_secs(1))?;
        assert_eq!(client.base_url(), "https://erp.example.com/api");
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_upstream_error() -> ProcuraResult<()> {
        // Port 9 (discard) is closed on test hosts; the connection is refused.
        let client = RemoteClient::new("http://127.0.0.1:9", Duration::from_millis(500))?;
        let err = client.list_schemas(&CompanyScope::unscoped()).await;
        assert!(matches!(
            err,
            Err(ProcuraError::Storage(StorageError::Upstream { .. }))
        ));
        Ok(())
    }
}
