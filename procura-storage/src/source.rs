//! Data source trait behind the cache.
//!
//! Implemented by the flat [`JsonStore`](crate::JsonStore) in demo mode and by
//! the remote peer client in the API crate. Every call carries the caller's
//! opaque [`CompanyScope`]; the JSON store ignores it, the remote client
//! forwards it.

use async_trait::async_trait;
use procura_core::{
    Company, CompanyScope, Entity, ProcuraResult, RecordId, RelationGroup, RelationLink,
    RelationQuery, SchemaDescriptor, SchemaId,
};
use serde_json::{Map, Value};

#[async_trait]
pub trait DataSource: Send + Sync {
    // ========================================================================
    // SCHEMA OPERATIONS
    // ========================================================================

    async fn list_schemas(&self, scope: &CompanyScope) -> ProcuraResult<Vec<SchemaDescriptor>>;

    async fn get_schema(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
    ) -> ProcuraResult<SchemaDescriptor>;

    /// Insert or replace a schema.
    async fn put_schema(&self, scope: &CompanyScope, schema: &SchemaDescriptor) -> ProcuraResult<()>;

    // ========================================================================
    // COMPANY OPERATIONS
    // ========================================================================

    async fn list_companies(&self, scope: &CompanyScope) -> ProcuraResult<Vec<Company>>;

    // ========================================================================
    // RECORD OPERATIONS
    // ========================================================================

    async fn list_records(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
    ) -> ProcuraResult<Vec<Entity>>;

    async fn get_record(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
        id: &RecordId,
    ) -> ProcuraResult<Entity>;

    /// Create a record. An `id` attribute is honoured; otherwise one is
    /// assigned.
    async fn create_record(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
        attributes: Map<String, Value>,
    ) -> ProcuraResult<Entity>;

    /// Replace an existing record's attributes.
    async fn update_record(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
        record: Entity,
    ) -> ProcuraResult<Entity>;

    /// Delete a record together with every relation touching it.
    async fn delete_record(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
        id: &RecordId,
    ) -> ProcuraResult<()>;

    // ========================================================================
    // RELATION OPERATIONS
    // ========================================================================

    async fn relations(
        &self,
        scope: &CompanyScope,
        query: &RelationQuery,
    ) -> ProcuraResult<Vec<RelationGroup>>;

    async fn add_relation(&self, scope: &CompanyScope, link: &RelationLink) -> ProcuraResult<()>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Cheap liveness check of the underlying store or peer.
    async fn health_check(&self) -> ProcuraResult<()>;
}
