//! Relation REST API Routes
//!
//! `GET /relations` answers with relation groups around one entity; it is
//! not cached. `POST /relations` stores a link and invalidates.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use procura_core::{RelationLink, RelationQuery};
use std::sync::Arc;

use crate::{
    cached_source::CachedSource,
    error::{ApiError, ApiResult},
    extractors::Scope,
    state::AppState,
};

/// GET /relations?schema=&id=&direction=&otherSchema=
pub async fn get_relations(
    State(source): State<Arc<CachedSource>>,
    Scope(scope): Scope,
    query: Result<Query<RelationQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query.map_err(|e| ApiError::invalid_input(e.body_text()))?;
    let groups = source.relations(&scope, &query).await?;
    tracing::debug!(
        schema = %query.schema,
        id = %query.id,
        direction = query.direction.as_str(),
        groups = groups.len(),
        "Relations fetched"
    );
    Ok(Json(groups))
}

/// POST /relations - Store a link between two records
pub async fn add_relation(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Json(link): Json<RelationLink>,
) -> ApiResult<impl IntoResponse> {
    if link.relation_type.trim().is_empty() {
        return Err(ApiError::missing_field("relationType"));
    }

    state.source.source().add_relation(&scope, &link).await?;
    tracing::info!(
        source = %format!("{}/{}", link.source_schema, link.source_id),
        target = %format!("{}/{}", link.target_schema, link.target_id),
        relation_type = %link.relation_type,
        "Relation added"
    );
    state.invalidate().await;

    Ok((StatusCode::CREATED, Json(link)))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_relations).post(add_relation))
        .with_state(state)
}
