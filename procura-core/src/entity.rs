//! Typed record representation.
//!
//! Records are schema-described, so apart from `id` their shape is only known
//! at runtime. `Entity` keeps `id` as a typed field and every other attribute
//! in an explicit map.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{RecordId, SchemaDescriptor};

/// Attribute consulted after the title-role field.
pub const NAME_ATTRIBUTE: &str = "name";
/// Attribute consulted after `name`.
pub const TITLE_ATTRIBUTE: &str = "title";

/// A schema-described record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: RecordId,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Scalar attribute rendered as text. Empty strings, nulls, arrays and
    /// objects yield `None`.
    pub fn attr_text(&self, name: &str) -> Option<String> {
        match self.attributes.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Human label derived from schema metadata.
    ///
    /// Order: the schema's title-role field, then `name`, then `title`.
    /// Returns `None` when none of them holds a value; callers fall back to
    /// whatever identifier they used to reach this record.
    pub fn label(&self, schema: Option<&SchemaDescriptor>) -> Option<String> {
        schema
            .and_then(|s| s.title_field())
            .and_then(|field| self.attr_text(&field.name))
            .or_else(|| self.attr_text(NAME_ATTRIBUTE))
            .or_else(|| self.attr_text(TITLE_ATTRIBUTE))
    }
}

fn deserialize_record_id<'de, D>(deserializer: D) -> Result<RecordId, D::Error>
where
    D: Deserializer<'de>,
{
    // Upstream stores sometimes emit numeric ids.
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(RecordId::new(s)),
        Value::Number(n) => Ok(RecordId::new(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "record id must be a string or number, got {}",
            other
        ))),
    }
}

/// Company record served by the companies cache domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDescriptor, FieldRole, FieldType};
    use serde_json::json;

    fn vendor_schema() -> SchemaDescriptor {
        SchemaDescriptor::new("vendors", "Vendors").with_field(
            FieldDescriptor::new("companyName", FieldType::Text).with_role(FieldRole::Title),
        )
    }

    #[test]
    fn test_entity_flattens_attributes() -> Result<(), serde_json::Error> {
        let entity: Entity = serde_json::from_value(json!({
            "id": "V-1",
            "companyName": "Acme",
            "rating": 4
        }))?;
        assert_eq!(entity.id.as_str(), "V-1");
        assert_eq!(entity.attr_text("companyName").as_deref(), Some("Acme"));
        assert_eq!(entity.attr_text("rating").as_deref(), Some("4"));
        assert!(entity.attr("id").is_none());

        let back = serde_json::to_value(&entity)?;
        assert_eq!(back["id"], "V-1");
        assert_eq!(back["companyName"], "Acme");
        Ok(())
    }

    #[test]
    fn test_numeric_id_is_accepted() -> Result<(), serde_json::Error> {
        let entity: Entity = serde_json::from_value(json!({ "id": 42 }))?;
        assert_eq!(entity.id.as_str(), "42");
        Ok(())
    }

    #[test]
    fn test_label_prefers_title_role() {
        let entity = Entity::new("V-1")
            .with_attr("companyName", "Acme Corp")
            .with_attr("name", "acme");
        assert_eq!(entity.label(Some(&vendor_schema())).as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn test_label_falls_back_to_name_then_title() {
        let schema = vendor_schema();
        let named = Entity::new("V-2").with_attr("name", "Globex");
        assert_eq!(named.label(Some(&schema)).as_deref(), Some("Globex"));

        let titled = Entity::new("V-3").with_attr("title", "Initech");
        assert_eq!(titled.label(None).as_deref(), Some("Initech"));

        let blank = Entity::new("V-4").with_attr("companyName", "  ");
        assert_eq!(blank.label(Some(&schema)), None);
    }
}
