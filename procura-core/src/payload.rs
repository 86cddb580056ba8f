//! Normalizers for upstream response payloads.
//!
//! Upstream services wrap the same data in a handful of envelopes (a bare
//! array, `{ "data": [...] }`, `{ "records": [...] }`, ...). Each known
//! envelope is an explicit variant here; anything else is a
//! [`RelationError::ResponseShape`] rather than a guess.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::{Company, Entity, ProcuraResult, RelationError, RelationGroup, SchemaDescriptor};

#[derive(Deserialize)]
#[serde(untagged)]
enum ListShape<T> {
    Bare(Vec<T>),
    Data { data: Vec<T> },
    Records { records: Vec<T> },
    Items { items: Vec<T> },
    Relations { relations: Vec<T> },
}

impl<T> ListShape<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(v)
            | Self::Data { data: v }
            | Self::Records { records: v }
            | Self::Items { items: v }
            | Self::Relations { relations: v } => v,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ObjectShape<T> {
    Data { data: T },
    Bare(T),
}

impl<T> ObjectShape<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Data { data } | Self::Bare(data) => data,
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array of {} items", items.len()),
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).take(5).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
    }
}

fn shape_error(expected: &str, value: &Value) -> RelationError {
    RelationError::ResponseShape {
        expected: expected.to_string(),
        found: describe(value),
    }
}

fn normalize_list<T: DeserializeOwned>(value: Value, expected: &str) -> ProcuraResult<Vec<T>> {
    match ListShape::<T>::deserialize(&value) {
        Ok(shape) => Ok(shape.into_vec()),
        Err(_) => Err(shape_error(expected, &value).into()),
    }
}

fn normalize_object<T: DeserializeOwned>(value: Value, expected: &str) -> ProcuraResult<T> {
    match ObjectShape::<T>::deserialize(&value) {
        Ok(shape) => Ok(shape.into_inner()),
        Err(_) => Err(shape_error(expected, &value).into()),
    }
}

/// A list of records in any known envelope.
pub fn normalize_records(value: Value) -> ProcuraResult<Vec<Entity>> {
    normalize_list(value, "record list")
}

/// A single record, bare or wrapped in `data`.
pub fn normalize_record(value: Value) -> ProcuraResult<Entity> {
    normalize_object(value, "record")
}

/// Schema metadata, bare or wrapped in `data`.
pub fn normalize_schema(value: Value) -> ProcuraResult<SchemaDescriptor> {
    normalize_object(value, "schema")
}

/// A list of schemas in any known envelope.
pub fn normalize_schemas(value: Value) -> ProcuraResult<Vec<SchemaDescriptor>> {
    normalize_list(value, "schema list")
}

/// A list of companies in any known envelope.
pub fn normalize_companies(value: Value) -> ProcuraResult<Vec<Company>> {
    normalize_list(value, "company list")
}

/// The `/relations` response.
pub fn normalize_relation_groups(value: Value) -> ProcuraResult<Vec<RelationGroup>> {
    normalize_list(value, "relation groups")
}
