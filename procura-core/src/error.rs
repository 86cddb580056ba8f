//! Error types for Procura operations

use thiserror::Error;

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The fetcher behind a cache miss failed. Nothing was cached.
    #[error("Fetch failed for cache key {key}: {reason}")]
    FetchFailed { key: String, reason: String },

    #[error("Cache domain {domain} unavailable: {reason}")]
    DomainUnavailable { domain: String, reason: String },
}

/// Failures of individual invalidation steps.
///
/// These never fail a `clear_all()` call; they are collected into its report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidationError {
    #[error("Failed to clear cache domain {domain}: {reason}")]
    DomainFailed { domain: String, reason: String },

    #[error("Failed to revalidate page {path}: {reason}")]
    RevalidationFailed { path: String, reason: String },

    #[error("Remote cache clear failed: {reason}")]
    RemoteFailed { reason: String },
}

/// Relation edge retrieval errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelationError {
    #[error("Relation fetch failed for {schema}/{id}: {reason}")]
    FetchFailed {
        schema: String,
        id: String,
        reason: String,
    },

    /// An upstream payload matched none of the known response shapes.
    #[error("Unrecognized {expected} response shape: {found}")]
    ResponseShape { expected: String, found: String },
}

/// Picker field resolution errors. Each is scoped to one field value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Failed to fetch referenced record {schema}/{id}: {reason}")]
    RecordFetchFailed {
        schema: String,
        id: String,
        reason: String,
    },

    #[error("Schema {schema} unavailable: {reason}")]
    SchemaUnavailable { schema: String, reason: String },
}

/// Flat JSON store and data source errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {schema}/{id}")]
    RecordNotFound { schema: String, id: String },

    #[error("Schema not found: {schema}")]
    SchemaNotFound { schema: String },

    #[error("Record already exists: {schema}/{id}")]
    RecordExists { schema: String, id: String },

    #[error("Store I/O failed for {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Store serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Upstream request failed: {reason}")]
    Upstream { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Procura errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcuraError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalidation error: {0}")]
    Invalidation(#[from] InvalidationError),

    #[error("Relation error: {0}")]
    Relation(#[from] RelationError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ProcuraError {
    /// True when the error means "the thing does not exist" rather than
    /// "something went wrong".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Storage(StorageError::RecordNotFound { .. } | StorageError::SchemaNotFound { .. })
        )
    }
}

/// Result type alias for Procura operations.
pub type ProcuraResult<T> = Result<T, ProcuraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::FetchFailed {
            key: "schemas:all".to_string(),
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("schemas:all"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_response_shape_display() {
        let err = RelationError::ResponseShape {
            expected: "relation groups".to_string(),
            found: "string".to_string(),
        };
        assert!(err.to_string().contains("relation groups"));
    }

    #[test]
    fn test_procura_error_from_variants() {
        let cache = ProcuraError::from(CacheError::DomainUnavailable {
            domain: "schemas".to_string(),
            reason: "x".to_string(),
        });
        assert!(matches!(cache, ProcuraError::Cache(_)));

        let storage = ProcuraError::from(StorageError::RecordNotFound {
            schema: "vendors".to_string(),
            id: "V-9".to_string(),
        });
        assert!(storage.is_not_found());

        let remote = ProcuraError::from(InvalidationError::RemoteFailed {
            reason: "timeout".to_string(),
        });
        assert!(!remote.is_not_found());
        assert!(remote.to_string().contains("timeout"));
    }
}
