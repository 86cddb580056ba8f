//! Error Types for the Procura API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use procura_core::{CacheError, ConfigError, ProcuraError, RelationError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested record does not exist
    EntityNotFound,

    /// Requested schema does not exist
    SchemaNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Record with the same identifier already exists
    EntityAlreadyExists,

    // ========================================================================
    // Server Errors (500, 502, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Reading or writing the data file failed
    StorageError,

    /// The remote peer failed or answered with something unusable
    UpstreamError,

    /// Service is temporarily unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField => StatusCode::BAD_REQUEST,

            ErrorCode::EntityNotFound | ErrorCode::SchemaNotFound => StatusCode::NOT_FOUND,

            ErrorCode::EntityAlreadyExists => StatusCode::CONFLICT,

            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::StorageError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::EntityNotFound => "Record not found",
            ErrorCode::SchemaNotFound => "Schema not found",
            ErrorCode::EntityAlreadyExists => "Record already exists",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageError => "Storage operation failed",
            ErrorCode::UpstreamError => "Upstream service failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn entity_not_found(schema: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("Record {}/{} not found", schema, id),
        )
    }

    pub fn schema_not_found(schema: impl fmt::Display) -> Self {
        Self::new(ErrorCode::SchemaNotFound, format!("Schema {} not found", schema))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<ProcuraError> for ApiError {
    fn from(err: ProcuraError) -> Self {
        match err {
            ProcuraError::Storage(StorageError::RecordNotFound { schema, id }) => {
                ApiError::entity_not_found(schema, id)
            }
            ProcuraError::Storage(StorageError::SchemaNotFound { schema }) => {
                ApiError::schema_not_found(schema)
            }
            ProcuraError::Storage(StorageError::RecordExists { schema, id }) => ApiError::new(
                ErrorCode::EntityAlreadyExists,
                format!("Record {}/{} already exists", schema, id),
            ),
            ProcuraError::Storage(StorageError::Upstream { reason })
            | ProcuraError::Relation(RelationError::FetchFailed { reason, .. }) => {
                ApiError::upstream(reason)
            }
            ProcuraError::Relation(RelationError::ResponseShape { expected, found }) => {
                ApiError::upstream(format!("Unrecognized {} response: {}", expected, found))
            }
            ProcuraError::Cache(CacheError::FetchFailed { key, reason }) => {
                tracing::warn!(key = %key, reason = %reason, "Cache fill failed");
                ApiError::upstream(reason)
            }
            ProcuraError::Cache(CacheError::DomainUnavailable { .. }) => {
                ApiError::service_unavailable(err.to_string())
            }
            ProcuraError::Config(ConfigError::MissingRequired { field }) => {
                ApiError::missing_field(&field)
            }
            ProcuraError::Config(ConfigError::InvalidValue { .. }) => {
                ApiError::invalid_input(err.to_string())
            }
            ProcuraError::Storage(StorageError::Io { .. } | StorageError::Serialization { .. }) => {
                // Log the full error; the response stays generic.
                tracing::error!(error = %err, "Storage error");
                ApiError::from_code(ErrorCode::StorageError)
            }
            other => {
                tracing::error!(error = %other, "Unhandled error");
                ApiError::internal_error(other.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::EntityNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::SchemaNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::EntityAlreadyExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::UpstreamError.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::StorageError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_from_procura_error() {
        let err = ApiError::from(ProcuraError::from(StorageError::RecordNotFound {
            schema: "vendors".to_string(),
            id: "V-9".to_string(),
        }));
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        assert!(err.message.contains("vendors/V-9"));

        let err = ApiError::from(ProcuraError::from(CacheError::FetchFailed {
            key: "_|schemas/all".to_string(),
            reason: "peer timed out".to_string(),
        }));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = ApiError::from(ProcuraError::from(StorageError::Io {
            path: "/secret/data.json".to_string(),
            reason: "permission denied".to_string(),
        }));
        assert_eq!(err.code, ErrorCode::StorageError);
        assert!(!err.message.contains("/secret"));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::schema_not_found("vendors")
            .with_details(serde_json::json!({ "schema": "vendors" }));
        let json = serde_json::to_string(&err)?;
        assert!(json.contains("SCHEMA_NOT_FOUND"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }
}
