//! Identity types for Procura records and schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Defines a string-backed identifier newtype.
///
/// Record and schema identifiers come from user-authored schema documents,
/// so they are opaque strings rather than UUIDs.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a schema (e.g. `purchase_orders`).
    SchemaId
);

string_id!(
    /// Identifier of a record within a schema (e.g. `PO-1`).
    RecordId
);

string_id!(
    /// Opaque company scoping token.
    ///
    /// Carried from the caller to the cache layer untouched; the only thing
    /// the sync layer does with it is keep cache entries of different scopes
    /// apart.
    CompanyScope
);

impl CompanyScope {
    /// Scope used when the caller did not send one.
    pub fn unscoped() -> Self {
        Self::new("_")
    }
}

impl Default for CompanyScope {
    fn default() -> Self {
        Self::unscoped()
    }
}
