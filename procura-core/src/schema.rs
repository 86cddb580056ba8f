//! Schema metadata consumed by the relation resolver.
//!
//! Schemas themselves are authored and stored elsewhere; this module only
//! models the read contract: which field carries a record's human label and
//! which fields are foreign keys ("pickers") into other schemas.

use serde::{Deserialize, Serialize};

use crate::SchemaId;

/// Storage/editor type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Select,
    /// Foreign key into another schema's records.
    Picker,
    /// Any field type this layer does not interpret.
    #[serde(other)]
    Other,
}

/// Presentation role of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    /// The field whose value is the record's human label.
    Title,
    Subtitle,
    Description,
    #[serde(other)]
    Other,
}

/// A single field in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<FieldRole>,
    #[serde(
        default,
        rename = "targetSchema",
        alias = "targetSchemaId",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_schema_id: Option<SchemaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            role: None,
            target_schema_id: None,
            label: None,
        }
    }

    /// Create a picker field pointing at `target`.
    pub fn picker(name: impl Into<String>, target: impl Into<SchemaId>) -> Self {
        Self {
            target_schema_id: Some(target.into()),
            ..Self::new(name, FieldType::Picker)
        }
    }

    pub fn with_role(mut self, role: FieldRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_title(&self) -> bool {
        self.role == Some(FieldRole::Title)
    }

    /// Target schema if this is a picker with a usable target.
    pub fn picker_target(&self) -> Option<&SchemaId> {
        match self.field_type {
            FieldType::Picker => self.target_schema_id.as_ref(),
            _ => None,
        }
    }
}

/// Field metadata for one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub id: SchemaId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    pub fn new(id: impl Into<SchemaId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The first field marked `role = title`.
    pub fn title_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.is_title())
    }

    /// Picker fields that name a target schema.
    pub fn picker_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.picker_target().is_some())
    }

    pub fn has_pickers(&self) -> bool {
        self.picker_fields().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_descriptor_wire_format() -> Result<(), serde_json::Error> {
        let field: FieldDescriptor = serde_json::from_str(
            r#"{"name":"vendorId","type":"picker","targetSchema":"vendors"}"#,
        )?;
        assert_eq!(field.field_type, FieldType::Picker);
        assert_eq!(field.picker_target(), Some(&SchemaId::new("vendors")));

        let aliased: FieldDescriptor = serde_json::from_str(
            r#"{"name":"vendorId","type":"picker","targetSchemaId":"vendors"}"#,
        )?;
        assert_eq!(aliased.target_schema_id, field.target_schema_id);
        Ok(())
    }

    #[test]
    fn test_unknown_type_and_role_are_tolerated() -> Result<(), serde_json::Error> {
        let field: FieldDescriptor =
            serde_json::from_str(r#"{"name":"notes","type":"richtext","role":"badge"}"#)?;
        assert_eq!(field.field_type, FieldType::Other);
        assert_eq!(field.role, Some(FieldRole::Other));
        assert!(field.picker_target().is_none());
        Ok(())
    }

    #[test]
    fn test_picker_without_target_is_ignored() {
        let schema = SchemaDescriptor::new("line_items", "Line Items")
            .with_field(FieldDescriptor::new("orphan", FieldType::Picker))
            .with_field(FieldDescriptor::picker("vendorId", "vendors"));

        let pickers: Vec<_> = schema.picker_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(pickers, vec!["vendorId"]);
        assert!(schema.has_pickers());
    }

    #[test]
    fn test_title_field_lookup() {
        let schema = SchemaDescriptor::new("vendors", "Vendors")
            .with_field(FieldDescriptor::new("code", FieldType::Text))
            .with_field(FieldDescriptor::new("companyName", FieldType::Text).with_role(FieldRole::Title));

        assert_eq!(schema.title_field().map(|f| f.name.as_str()), Some("companyName"));
        assert!(!schema.has_pickers());
    }
}
