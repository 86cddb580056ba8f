//! Schema REST API Routes
//!
//! Schema metadata is served from the cached schema list (`schemas` domain).

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use procura_core::{SchemaDescriptor, SchemaId};
use std::sync::Arc;

use crate::{
    cached_source::CachedSource,
    error::{ApiError, ApiResult},
    extractors::Scope,
    state::AppState,
};

/// GET /schemas - All schemas
pub async fn list_schemas(
    State(source): State<Arc<CachedSource>>,
    Scope(scope): Scope,
) -> ApiResult<impl IntoResponse> {
    let schemas = source.list_schemas(&scope).await?;
    Ok(Json(schemas.into_value()))
}

/// GET /schema/:schema_id - One schema's metadata
pub async fn get_schema(
    State(source): State<Arc<CachedSource>>,
    Scope(scope): Scope,
    Path(schema_id): Path<SchemaId>,
) -> ApiResult<impl IntoResponse> {
    let schema = source.get_schema(&scope, &schema_id).await?;
    Ok(Json(schema.into_value()))
}

/// PUT /schema/:schema_id - Insert or replace a schema
pub async fn put_schema(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Path(schema_id): Path<SchemaId>,
    Json(schema): Json<SchemaDescriptor>,
) -> ApiResult<impl IntoResponse> {
    if schema.id != schema_id {
        return Err(ApiError::invalid_input(format!(
            "Body schema id {} does not match path id {}",
            schema.id, schema_id
        )));
    }

    state.source.source().put_schema(&scope, &schema).await?;
    tracing::info!(schema = %schema_id, fields = schema.fields.len(), "Schema saved");
    state.invalidate().await;

    Ok(Json(schema))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/schemas", get(list_schemas))
        .route("/schema/:schema_id", get(get_schema).put(put_schema))
        .with_state(state)
}
