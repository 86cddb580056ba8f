//! Relation edges, the `/relations` wire contract, and resolved entities.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{Entity, RecordId, SchemaId};

/// Orientation of a link as seen from the requesting entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationDirection {
    #[serde(alias = "out")]
    Outgoing,
    #[serde(alias = "in")]
    Incoming,
}

impl RelationDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
        }
    }
}

impl fmt::Display for RelationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which directions a `/relations` request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionFilter {
    #[default]
    Both,
    #[serde(alias = "out")]
    Outgoing,
    #[serde(alias = "in")]
    Incoming,
}

impl DirectionFilter {
    pub fn includes(&self, direction: RelationDirection) -> bool {
        match self {
            Self::Both => true,
            Self::Outgoing => direction == RelationDirection::Outgoing,
            Self::Incoming => direction == RelationDirection::Incoming,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
        }
    }
}

impl FromStr for DirectionFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "both" | "" => Ok(Self::Both),
            "outgoing" | "out" => Ok(Self::Outgoing),
            "incoming" | "in" => Ok(Self::Incoming),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// One directed link between two entities of possibly different schemas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEdge {
    pub source_schema_id: SchemaId,
    pub source_id: RecordId,
    pub target_schema_id: SchemaId,
    pub target_id: RecordId,
    pub relation_type: String,
    pub direction: RelationDirection,
}

/// A stored link, as persisted by the flat JSON store and accepted by
/// `POST /relations`. Direction is implied: source → target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationLink {
    pub source_schema: SchemaId,
    pub source_id: RecordId,
    pub target_schema: SchemaId,
    pub target_id: RecordId,
    pub relation_type: String,
}

impl RelationLink {
    pub fn touches(&self, schema: &SchemaId, id: &RecordId) -> bool {
        (&self.source_schema == schema && &self.source_id == id)
            || (&self.target_schema == schema && &self.target_id == id)
    }
}

/// Query parameters of `GET /relations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationQuery {
    pub schema: SchemaId,
    pub id: RecordId,
    #[serde(default)]
    pub direction: DirectionFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_schema: Option<SchemaId>,
}

impl RelationQuery {
    /// Both directions between one entity and one other schema.
    pub fn between(schema: SchemaId, id: RecordId, other_schema: SchemaId) -> Self {
        Self {
            schema,
            id,
            direction: DirectionFilter::Both,
            other_schema: Some(other_schema),
        }
    }
}

/// One group in the `/relations` response: every entity of `schema` linked to
/// the requested entity by `relation_type` in `direction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationGroup {
    pub schema: SchemaId,
    pub direction: RelationDirection,
    pub relation_type: String,
    #[serde(default)]
    pub data: Vec<Entity>,
}

impl RelationGroup {
    /// Expand the group into edges anchored at the requesting entity.
    pub fn edges(&self, source_schema: &SchemaId, source_id: &RecordId) -> Vec<RelationEdge> {
        self.data
            .iter()
            .map(|entity| RelationEdge {
                source_schema_id: source_schema.clone(),
                source_id: source_id.clone(),
                target_schema_id: self.schema.clone(),
                target_id: entity.id.clone(),
                relation_type: self.relation_type.clone(),
                direction: self.direction,
            })
            .collect()
    }
}

/// Turn a relation type identifier into a display label.
///
/// `CONTAINS_ITEM` becomes `Contains Item`, `has_vendor` becomes `Has Vendor`.
pub fn humanize_relation_type(relation_type: &str) -> String {
    relation_type
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A picker field's referenced record plus the label derived for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    #[serde(flatten)]
    pub record: Entity,
    #[serde(rename = "resolvedLabel")]
    pub resolved_label: String,
}

/// A related target entity annotated with provenance and resolved pickers.
///
/// Serializes as the entity's own attributes plus `_relationType`,
/// `_relationDirection`, and one `_<field>_resolved` object per resolved
/// picker field.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntity {
    pub entity: Entity,
    pub relation_type: String,
    pub direction: RelationDirection,
    /// Resolved picker fields keyed by field name.
    pub resolved: BTreeMap<String, ResolvedReference>,
}

impl ResolvedEntity {
    pub fn new(entity: Entity, relation_type: impl Into<String>, direction: RelationDirection) -> Self {
        Self {
            entity,
            relation_type: relation_type.into(),
            direction,
            resolved: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.entity.id
    }

    pub fn resolved_field(&self, field: &str) -> Option<&ResolvedReference> {
        self.resolved.get(field)
    }

    /// Label for a picker field, or the raw foreign key when unresolved.
    pub fn display_value(&self, field: &str) -> Option<String> {
        self.resolved
            .get(field)
            .map(|r| r.resolved_label.clone())
            .or_else(|| self.entity.attr_text(field))
    }
}

impl Serialize for ResolvedEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entity.attributes.len() + 3 + self.resolved.len()))?;
        map.serialize_entry("id", &self.entity.id)?;
        for (key, value) in &self.entity.attributes {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("_relationType", &self.relation_type)?;
        map.serialize_entry("_relationDirection", &self.direction)?;
        for (field, reference) in &self.resolved {
            map.serialize_entry(&format!("_{}_resolved", field), reference)?;
        }
        map.end()
    }
}
