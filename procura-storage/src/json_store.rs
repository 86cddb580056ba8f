//! Flat JSON file store used in demo mode.
//!
//! The whole dataset lives in one document:
//!
//! ```json
//! {
//!   "schemas":   [ { "id": "vendors", "name": "Vendors", "fields": [...] } ],
//!   "records":   { "vendors": [ { "id": "V-1", "companyName": "Acme" } ] },
//!   "relations": [ { "sourceSchema": "...", "sourceId": "...", "targetSchema": "...",
//!                    "targetId": "...", "relationType": "..." } ],
//!   "companies": [ { "id": "acme", "name": "Acme Corp" } ]
//! }
//! ```
//!
//! Every mutation rewrites the file. There is no journaling and no locking
//! across processes.

use async_trait::async_trait;
use procura_core::{
    Company, CompanyScope, Entity, ProcuraResult, RecordId, RelationDirection, RelationGroup,
    RelationLink, RelationQuery, SchemaDescriptor, SchemaId, StorageError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::source::DataSource;

/// The on-disk document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub schemas: Vec<SchemaDescriptor>,
    #[serde(default)]
    pub records: BTreeMap<SchemaId, Vec<Entity>>,
    #[serde(default)]
    pub relations: Vec<RelationLink>,
    #[serde(default)]
    pub companies: Vec<Company>,
}

impl StoreData {
    pub fn with_schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schemas.retain(|s| s.id != schema.id);
        self.schemas.push(schema);
        self
    }

    pub fn with_record(mut self, schema_id: impl Into<SchemaId>, record: Entity) -> Self {
        self.records.entry(schema_id.into()).or_default().push(record);
        self
    }

    pub fn with_relation(mut self, link: RelationLink) -> Self {
        self.relations.push(link);
        self
    }

    pub fn with_company(mut self, company: Company) -> Self {
        self.companies.push(company);
        self
    }

    fn schema(&self, schema_id: &SchemaId) -> Option<&SchemaDescriptor> {
        self.schemas.iter().find(|s| &s.id == schema_id)
    }

    fn knows_schema(&self, schema_id: &SchemaId) -> bool {
        self.schema(schema_id).is_some() || self.records.contains_key(schema_id)
    }

    fn record(&self, schema_id: &SchemaId, id: &RecordId) -> Option<&Entity> {
        self.records.get(schema_id)?.iter().find(|r| &r.id == id)
    }

    /// Append `record` to the `(schema, direction, relation_type)` group,
    /// creating the group on first use so groups keep link order.
    fn push_related(
        &self,
        groups: &mut Vec<RelationGroup>,
        schema: &SchemaId,
        id: &RecordId,
        direction: RelationDirection,
        relation_type: &str,
    ) {
        let Some(record) = self.record(schema, id) else {
            debug!(schema = %schema, id = %id, "Skipping relation to missing record");
            return;
        };
        let position = groups.iter().position(|g| {
            &g.schema == schema && g.direction == direction && g.relation_type == relation_type
        });
        match position {
            Some(i) => groups[i].data.push(record.clone()),
            None => groups.push(RelationGroup {
                schema: schema.clone(),
                direction,
                relation_type: relation_type.to_string(),
                data: vec![record.clone()],
            }),
        }
    }
}

fn record_not_found(schema_id: &SchemaId, id: &RecordId) -> StorageError {
    StorageError::RecordNotFound {
        schema: schema_id.to_string(),
        id: id.to_string(),
    }
}

fn schema_not_found(schema_id: &SchemaId) -> StorageError {
    StorageError::SchemaNotFound {
        schema: schema_id.to_string(),
    }
}

/// Pull an explicit `id` out of a new record's attributes.
fn take_record_id(attributes: &mut Map<String, Value>) -> Option<RecordId> {
    match attributes.remove("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(RecordId::new(s)),
        Value::Number(n) => Some(RecordId::new(n.to_string())),
        _ => None,
    }
}

/// [`DataSource`] over a [`StoreData`] document, optionally backed by a file.
#[derive(Debug)]
pub struct JsonStore {
    path: Option<PathBuf>,
    data: RwLock<StoreData>,
}

impl JsonStore {
    /// Load the store from `path`. A missing file is an empty store; the file
    /// is created on the first write.
    pub async fn open(path: impl AsRef<Path>) -> ProcuraResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| StorageError::Serialization {
                reason: format!("{}: {}", path.display(), e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Data file not found, starting with an empty store");
                StoreData::default()
            }
            Err(e) => {
                return Err(StorageError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        };
        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// An in-memory store that never touches disk.
    pub fn in_memory(data: StoreData) -> Self {
        Self {
            path: None,
            data: RwLock::new(data),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn snapshot(&self) -> StoreData {
        self.data.read().await.clone()
    }

    async fn persist(&self, data: &StoreData) -> ProcuraResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_error = |e: std::io::Error| StorageError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let contents = serde_json::to_string_pretty(data).map_err(|e| StorageError::Serialization {
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_error)?;
        debug!(path = %path.display(), "Data file written");
        Ok(())
    }

    /// Write `next` to disk, then make it the live document. A failed write
    /// leaves the live document untouched.
    async fn commit(
        &self,
        data: &mut RwLockWriteGuard<'_, StoreData>,
        next: StoreData,
    ) -> ProcuraResult<()> {
        self.persist(&next).await?;
        **data = next;
        Ok(())
    }
}

#[async_trait]
impl DataSource for JsonStore {
    async fn list_schemas(&self, _scope: &CompanyScope) -> ProcuraResult<Vec<SchemaDescriptor>> {
        Ok(self.data.read().await.schemas.clone())
    }

    async fn get_schema(
        &self,
        _scope: &CompanyScope,
        schema_id: &SchemaId,
    ) -> ProcuraResult<SchemaDescriptor> {
        let data = self.data.read().await;
        data.schema(schema_id)
            .cloned()
            .ok_or_else(|| schema_not_found(schema_id).into())
    }

    async fn put_schema(&self, _scope: &CompanyScope, schema: &SchemaDescriptor) -> ProcuraResult<()> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        match next.schemas.iter_mut().find(|s| s.id == schema.id) {
            Some(existing) => *existing = schema.clone(),
            None => next.schemas.push(schema.clone()),
        }
        self.commit(&mut data, next).await
    }

    async fn list_companies(&self, _scope: &CompanyScope) -> ProcuraResult<Vec<Company>> {
        Ok(self.data.read().await.companies.clone())
    }

    async fn list_records(
        &self,
        _scope: &CompanyScope,
        schema_id: &SchemaId,
    ) -> ProcuraResult<Vec<Entity>> {
        let data = self.data.read().await;
        if !data.knows_schema(schema_id) {
            return Err(schema_not_found(schema_id).into());
        }
        Ok(data.records.get(schema_id).cloned().unwrap_or_default())
    }

    async fn get_record(
        &self,
        _scope: &CompanyScope,
        schema_id: &SchemaId,
        id: &RecordId,
    ) -> ProcuraResult<Entity> {
        let data = self.data.read().await;
        data.record(schema_id, id)
            .cloned()
            .ok_or_else(|| record_not_found(schema_id, id).into())
    }

    async fn create_record(
        &self,
        _scope: &CompanyScope,
        schema_id: &SchemaId,
        mut attributes: Map<String, Value>,
    ) -> ProcuraResult<Entity> {
        let mut data = self.data.write().await;
        if !data.knows_schema(schema_id) {
            return Err(schema_not_found(schema_id).into());
        }

        let id = take_record_id(&mut attributes)
            .unwrap_or_else(|| RecordId::new(Uuid::now_v7().to_string()));
        if data.record(schema_id, &id).is_some() {
            return Err(StorageError::RecordExists {
                schema: schema_id.to_string(),
                id: id.to_string(),
            }
            .into());
        }

        let record = Entity { id, attributes };
        let mut next = data.clone();
        next.records
            .entry(schema_id.clone())
            .or_default()
            .push(record.clone());
        self.commit(&mut data, next).await?;
        Ok(record)
    }

    async fn update_record(
        &self,
        _scope: &CompanyScope,
        schema_id: &SchemaId,
        record: Entity,
    ) -> ProcuraResult<Entity> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let slot = next
            .records
            .get_mut(schema_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record.id))
            .ok_or_else(|| record_not_found(schema_id, &record.id))?;
        *slot = record.clone();
        self.commit(&mut data, next).await?;
        Ok(record)
    }

    async fn delete_record(
        &self,
        _scope: &CompanyScope,
        schema_id: &SchemaId,
        id: &RecordId,
    ) -> ProcuraResult<()> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let records = next
            .records
            .get_mut(schema_id)
            .ok_or_else(|| record_not_found(schema_id, id))?;
        let before = records.len();
        records.retain(|r| &r.id != id);
        if records.len() == before {
            return Err(record_not_found(schema_id, id).into());
        }

        let links_before = next.relations.len();
        next.relations.retain(|link| !link.touches(schema_id, id));
        let links_removed = links_before - next.relations.len();
        self.commit(&mut data, next).await?;
        debug!(schema = %schema_id, id = %id, links_removed, "Record deleted");
        Ok(())
    }

    async fn relations(
        &self,
        _scope: &CompanyScope,
        query: &RelationQuery,
    ) -> ProcuraResult<Vec<RelationGroup>> {
        let data = self.data.read().await;
        let wanted = |schema: &SchemaId| {
            query
                .other_schema
                .as_ref()
                .map(|other| other == schema)
                .unwrap_or(true)
        };

        let mut groups = Vec::new();
        for link in &data.relations {
            if link.source_schema == query.schema
                && link.source_id == query.id
                && query.direction.includes(RelationDirection::Outgoing)
                && wanted(&link.target_schema)
            {
                data.push_related(
                    &mut groups,
                    &link.target_schema,
                    &link.target_id,
                    RelationDirection::Outgoing,
                    &link.relation_type,
                );
            }
            if link.target_schema == query.schema
                && link.target_id == query.id
                && query.direction.includes(RelationDirection::Incoming)
                && wanted(&link.source_schema)
            {
                data.push_related(
                    &mut groups,
                    &link.source_schema,
                    &link.source_id,
                    RelationDirection::Incoming,
                    &link.relation_type,
                );
            }
        }
        Ok(groups)
    }

    async fn add_relation(&self, _scope: &CompanyScope, link: &RelationLink) -> ProcuraResult<()> {
        let mut data = self.data.write().await;
        if data.record(&link.source_schema, &link.source_id).is_none() {
            return Err(record_not_found(&link.source_schema, &link.source_id).into());
        }
        if data.record(&link.target_schema, &link.target_id).is_none() {
            return Err(record_not_found(&link.target_schema, &link.target_id).into());
        }
        if data.relations.contains(link) {
            return Ok(());
        }
        let mut next = data.clone();
        next.relations.push(link.clone());
        self.commit(&mut data, next).await
    }

    async fn health_check(&self) -> ProcuraResult<()> {
        let _data = self.data.read().await;
        Ok(())
    }
}
