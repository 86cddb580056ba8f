//! Procura Core - Data Types
//!
//! Typed data model shared by the cache, API, and client crates: record and
//! schema identifiers, schema field metadata, relation wire types, response
//! normalizers, and the error taxonomy. No I/O lives here.

pub mod entity;
pub mod error;
pub mod identity;
pub mod payload;
pub mod relation;
pub mod schema;

pub use entity::{Company, Entity, NAME_ATTRIBUTE, TITLE_ATTRIBUTE};
pub use error::{
    CacheError, ConfigError, InvalidationError, ProcuraError, ProcuraResult, RelationError,
    ResolutionError, StorageError,
};
pub use identity::{CompanyScope, RecordId, SchemaId, Timestamp};
pub use payload::{
    normalize_companies, normalize_record, normalize_records, normalize_relation_groups,
    normalize_schema, normalize_schemas,
};
pub use relation::{
    humanize_relation_type, DirectionFilter, RelationDirection, RelationEdge, RelationGroup,
    RelationLink, RelationQuery, ResolvedEntity, ResolvedReference,
};
pub use schema::{FieldDescriptor, FieldRole, FieldType, SchemaDescriptor};
