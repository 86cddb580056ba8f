//! Relation traversal and picker resolution.
//!
//! [`RelationResolver`] answers "which `target_schema` entities are linked to
//! this entity, in either direction", and swaps each picker field's foreign
//! key for a readable label from the referenced record.

mod resolver;
mod source;

pub use resolver::{flatten_groups, RelationResolver, RelationView, ResolveOutcome, ResolveRequest};
pub use source::{HttpRelationSource, RelationSource};
