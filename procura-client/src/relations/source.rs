use async_trait::async_trait;
use procura_core::{
    normalize_record, normalize_relation_groups, normalize_schema, Entity, ProcuraError,
    ProcuraResult, RecordId, RelationGroup, RelationQuery, SchemaDescriptor, SchemaId,
    StorageError,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ClientError;
use crate::gateway::CachedClient;

/// Everything the resolver reads.
#[async_trait]
pub trait RelationSource: Send + Sync {
    async fn relations(&self, query: &RelationQuery) -> ProcuraResult<Vec<RelationGroup>>;

    async fn entity(&self, schema: &SchemaId, id: &RecordId) -> ProcuraResult<Entity>;

    async fn schema(&self, schema: &SchemaId) -> ProcuraResult<SchemaDescriptor>;
}

/// Reads over HTTP through the client's strategies.
pub struct HttpRelationSource {
    client: Arc<CachedClient>,
}

impl HttpRelationSource {
    pub fn new(client: Arc<CachedClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RelationSource for HttpRelationSource {
    async fn relations(&self, query: &RelationQuery) -> ProcuraResult<Vec<RelationGroup>> {
        let mut params = BTreeMap::new();
        params.insert("schema".to_string(), query.schema.to_string());
        params.insert("id".to_string(), query.id.to_string());
        params.insert("direction".to_string(), query.direction.as_str().to_string());
        if let Some(other) = &query.other_schema {
            params.insert("otherSchema".to_string(), other.to_string());
        }

        let value = self
            .client
            .get_with_params("/relations", params)
            .await
            .map_err(|e| {
                to_procura(e, || StorageError::RecordNotFound {
                    schema: query.schema.to_string(),
                    id: query.id.to_string(),
                })
            })?;
        normalize_relation_groups(value)
    }

    async fn entity(&self, schema: &SchemaId, id: &RecordId) -> ProcuraResult<Entity> {
        let endpoint = format!("/entity/{}/{}", schema, id);
        let value = self.client.get(&endpoint).await.map_err(|e| {
            to_procura(e, || StorageError::RecordNotFound {
                schema: schema.to_string(),
                id: id.to_string(),
            })
        })?;
        normalize_record(value)
    }

    async fn schema(&self, schema: &SchemaId) -> ProcuraResult<SchemaDescriptor> {
        let endpoint = format!("/schema/{}", schema);
        let value = self.client.get(&endpoint).await.map_err(|e| {
            to_procura(e, || StorageError::SchemaNotFound {
                schema: schema.to_string(),
            })
        })?;
        normalize_schema(value)
    }
}

fn to_procura(err: ClientError, not_found: impl FnOnce() -> StorageError) -> ProcuraError {
    match err {
        ClientError::Procura(inner) => inner,
        other if other.is_not_found() => not_found().into(),
        other => StorageError::Upstream {
            reason: other.to_string(),
        }
        .into(),
    }
}
