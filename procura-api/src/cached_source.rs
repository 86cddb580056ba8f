//! Cached Data Source
//!
//! `CachedSource` puts one [`ResourceLoader`] per cache domain in front of a
//! [`DataSource`]. Routes read through it unchanged; writes go straight to the
//! source and are followed by a full invalidation in the route layer.
//!
//! Domains:
//! - `schemas`: the schema list, keyed `scope|all`; single schemas are served
//!   from it
//! - `companies`: the company list, keyed `scope|all`
//! - `resources`: record lists, keyed `scope|schema`
//! - `records`: single records, keyed `scope|schema/id`

use procura_core::{
    Company, CompanyScope, Entity, ProcuraResult, RecordId, RelationGroup, RelationQuery,
    SchemaDescriptor, SchemaId, StorageError,
};
use procura_storage::{CacheConfig, CacheDomain, CacheKey, CacheRead, DataSource, ResourceLoader};
use std::sync::Arc;

pub const SCHEMAS_DOMAIN: &str = "schemas";
pub const COMPANIES_DOMAIN: &str = "companies";
pub const RESOURCES_DOMAIN: &str = "resources";
pub const RECORDS_DOMAIN: &str = "records";

const ALL: &str = "all";

pub struct CachedSource {
    source: Arc<dyn DataSource>,
    config: CacheConfig,
    schemas: Arc<ResourceLoader<Vec<SchemaDescriptor>>>,
    companies: Arc<ResourceLoader<Vec<Company>>>,
    resources: Arc<ResourceLoader<Vec<Entity>>>,
    records: Arc<ResourceLoader<Entity>>,
}

impl CachedSource {
    pub fn new(source: Arc<dyn DataSource>, config: CacheConfig) -> Self {
        Self {
            source,
            config,
            schemas: Arc::new(ResourceLoader::new(SCHEMAS_DOMAIN)),
            companies: Arc::new(ResourceLoader::new(COMPANIES_DOMAIN)),
            resources: Arc::new(ResourceLoader::new(RESOURCES_DOMAIN)),
            records: Arc::new(ResourceLoader::new(RECORDS_DOMAIN)),
        }
    }

    /// The uncached source, for writes and relation lookups.
    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Every cache domain, for registration with the invalidation coordinator.
    pub fn domains(&self) -> Vec<Arc<dyn CacheDomain>> {
        let schemas: Arc<dyn CacheDomain> = self.schemas.clone();
        let companies: Arc<dyn CacheDomain> = self.companies.clone();
        let resources: Arc<dyn CacheDomain> = self.resources.clone();
        let records: Arc<dyn CacheDomain> = self.records.clone();
        vec![schemas, companies, resources, records]
    }

    // ========================================================================
    // SCHEMAS
    // ========================================================================

    pub async fn list_schemas(
        &self,
        scope: &CompanyScope,
    ) -> ProcuraResult<CacheRead<Vec<SchemaDescriptor>>> {
        let source = Arc::clone(&self.source);
        let owned_scope = scope.clone();
        self.schemas
            .load(
                CacheKey::scoped(scope, [ALL]),
                self.config.schema_ttl,
                move || async move { source.list_schemas(&owned_scope).await },
            )
            .await
    }

    pub async fn get_schema(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
    ) -> ProcuraResult<CacheRead<SchemaDescriptor>> {
        let list = self.list_schemas(scope).await?;
        let schema = list
            .value()
            .iter()
            .find(|s| &s.id == schema_id)
            .cloned()
            .ok_or_else(|| StorageError::SchemaNotFound {
                schema: schema_id.to_string(),
            })?;
        Ok(list.map(|_| schema))
    }

    // ========================================================================
    // COMPANIES
    // ========================================================================

    pub async fn list_companies(&self, scope: &CompanyScope) -> ProcuraResult<CacheRead<Vec<Company>>> {
        let source = Arc::clone(&self.source);
        let owned_scope = scope.clone();
        self.companies
            .load(
                CacheKey::scoped(scope, [ALL]),
                self.config.company_ttl,
                move || async move { source.list_companies(&owned_scope).await },
            )
            .await
    }

    // ========================================================================
    // RECORDS
    // ========================================================================

    pub async fn list_records(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
    ) -> ProcuraResult<CacheRead<Vec<Entity>>> {
        let source = Arc::clone(&self.source);
        let owned_scope = scope.clone();
        let owned_schema = schema_id.clone();
        self.resources
            .load(
                CacheKey::scoped(scope, [schema_id.as_str()]),
                self.config.resource_ttl,
                move || async move { source.list_records(&owned_scope, &owned_schema).await },
            )
            .await
    }

    pub async fn get_record(
        &self,
        scope: &CompanyScope,
        schema_id: &SchemaId,
        id: &RecordId,
    ) -> ProcuraResult<CacheRead<Entity>> {
        let source = Arc::clone(&self.source);
        let owned_scope = scope.clone();
        let owned_schema = schema_id.clone();
        let owned_id = id.clone();
        self.records
            .load(
                CacheKey::scoped(scope, [schema_id.as_str(), id.as_str()]),
                self.config.resource_ttl,
                move || async move {
                    source
                        .get_record(&owned_scope, &owned_schema, &owned_id)
                        .await
                },
            )
            .await
    }

    // ========================================================================
    // RELATIONS
    // ========================================================================

    /// Relation groups are read straight from the source.
    pub async fn relations(
        &self,
        scope: &CompanyScope,
        query: &RelationQuery,
    ) -> ProcuraResult<Vec<RelationGroup>> {
        self.source.relations(scope, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_storage::{JsonStore, StoreData};

    fn cached() -> CachedSource {
        let store = JsonStore::in_memory(
            StoreData::default()
                .with_schema(SchemaDescriptor::new("vendors", "Vendors"))
                .with_record("vendors", Entity::new("V-1").with_attr("name", "Acme")),
        );
        CachedSource::new(Arc::new(store), CacheConfig::default())
    }

    #[tokio::test]
    async fn test_second_read_is_a_hit() -> ProcuraResult<()> {
        let cached = cached();
        let scope = CompanyScope::unscoped();
        let schema = SchemaId::new("vendors");

        assert!(cached.list_records(&scope, &schema).await?.was_cache_miss());
        assert!(cached.list_records(&scope, &schema).await?.was_cache_hit());
        Ok(())
    }

    #[tokio::test]
    async fn test_scopes_are_cached_apart() -> ProcuraResult<()> {
        let cached = cached();
        let schema = SchemaId::new("vendors");

        cached.list_records(&CompanyScope::new("a"), &schema).await?;
        let other = cached.list_records(&CompanyScope::new("b"), &schema).await?;
        assert!(other.was_cache_miss());
        Ok(())
    }

    #[tokio::test]
    async fn test_single_schema_from_list() -> ProcuraResult<()> {
        let cached = cached();
        let scope = CompanyScope::unscoped();

        let schema = cached.get_schema(&scope, &SchemaId::new("vendors")).await?;
        assert_eq!(schema.value().name, "Vendors");

        let missing = cached.get_schema(&scope, &SchemaId::new("nope")).await;
        assert!(matches!(missing, Err(ref e) if e.is_not_found()));
        Ok(())
    }

    #[tokio::test]
    async fn test_domains_cover_every_loader() -> ProcuraResult<()> {
        let cached = cached();
        let scope = CompanyScope::unscoped();
        cached
            .get_record(&scope, &SchemaId::new("vendors"), &RecordId::new("V-1"))
            .await?;

        let names: Vec<String> = cached.domains().iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["schemas", "companies", "resources", "records"]);

        let mut removed = 0;
        for domain in cached.domains() {
            removed += domain.clear().await?;
        }
        assert_eq!(removed, 1);
        Ok(())
    }
}
