//! Resource REST API Routes
//!
//! Record lists and single records of one schema. Reads go through the
//! `resources` and `records` cache domains; every write is followed by a full
//! invalidation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use procura_core::{Entity, RecordId, SchemaId};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{
    cached_source::CachedSource,
    error::{ApiError, ApiResult},
    extractors::Scope,
    state::AppState,
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /resource/:schema_id - List records of a schema
pub async fn list_records(
    State(source): State<Arc<CachedSource>>,
    Scope(scope): Scope,
    Path(schema_id): Path<SchemaId>,
) -> ApiResult<impl IntoResponse> {
    let records = source.list_records(&scope, &schema_id).await?;
    Ok(Json(records.into_value()))
}

/// POST /resource/:schema_id - Create a record
pub async fn create_record(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Path(schema_id): Path<SchemaId>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let Value::Object(attributes) = body else {
        return Err(ApiError::invalid_input("Record body must be a JSON object"));
    };

    let record = state
        .source
        .source()
        .create_record(&scope, &schema_id, attributes)
        .await?;
    tracing::info!(schema = %schema_id, id = %record.id, "Record created");
    state.invalidate().await;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /resource/:schema_id/:id - Get one record
pub async fn get_record(
    State(source): State<Arc<CachedSource>>,
    Scope(scope): Scope,
    Path((schema_id, id)): Path<(SchemaId, RecordId)>,
) -> ApiResult<impl IntoResponse> {
    let record = source.get_record(&scope, &schema_id, &id).await?;
    Ok(Json(record.into_value()))
}

/// PUT /resource/:schema_id/:id - Replace a record's attributes
pub async fn update_record(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Path((schema_id, id)): Path<(SchemaId, RecordId)>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let Value::Object(attributes) = body else {
        return Err(ApiError::invalid_input("Record body must be a JSON object"));
    };
    let record = record_from_body(id, attributes)?;

    let updated = state
        .source
        .source()
        .update_record(&scope, &schema_id, record)
        .await?;
    tracing::info!(schema = %schema_id, id = %updated.id, "Record updated");
    state.invalidate().await;

    Ok(Json(updated))
}

/// DELETE /resource/:schema_id/:id - Delete a record and its relation links
pub async fn delete_record(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Path((schema_id, id)): Path<(SchemaId, RecordId)>,
) -> ApiResult<impl IntoResponse> {
    state
        .source
        .source()
        .delete_record(&scope, &schema_id, &id)
        .await?;
    tracing::info!(schema = %schema_id, id = %id, "Record deleted");
    state.invalidate().await;

    Ok(StatusCode::NO_CONTENT)
}

/// The path id wins; a body id that disagrees with it is rejected.
fn record_from_body(id: RecordId, mut attributes: Map<String, Value>) -> ApiResult<Entity> {
    match attributes.remove("id") {
        None => {}
        Some(Value::String(body_id)) if body_id == id.as_str() => {}
        Some(Value::Number(body_id)) if body_id.to_string() == id.as_str() => {}
        Some(other) => {
            return Err(ApiError::invalid_input(format!(
                "Body id {} does not match path id {}",
                other, id
            )))
        }
    }
    Ok(Entity { id, attributes })
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/:schema_id", get(list_records).post(create_record))
        .route(
            "/:schema_id/:id",
            get(get_record).put(update_record).delete(delete_record),
        )
        .with_state(state)
}
