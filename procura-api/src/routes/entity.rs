//! Entity lookup route used by picker resolution.
//!
//! Same data as `GET /resource/:schema_id/:id`, served from the same
//! `records` cache domain.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use procura_core::{RecordId, SchemaId};
use std::sync::Arc;

use crate::{cached_source::CachedSource, error::ApiResult, extractors::Scope, state::AppState};

/// GET /entity/:schema_id/:id - Referenced record lookup
pub async fn get_entity(
    State(source): State<Arc<CachedSource>>,
    Scope(scope): Scope,
    Path((schema_id, id)): Path<(SchemaId, RecordId)>,
) -> ApiResult<impl IntoResponse> {
    let record = source.get_record(&scope, &schema_id, &id).await?;
    Ok(Json(record.into_value()))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/:schema_id/:id", get(get_entity))
        .with_state(state)
}
