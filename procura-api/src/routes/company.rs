//! Company list route (`companies` cache domain).

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;

use crate::{cached_source::CachedSource, error::ApiResult, extractors::Scope, state::AppState};

/// GET /companies
pub async fn list_companies(
    State(source): State<Arc<CachedSource>>,
    Scope(scope): Scope,
) -> ApiResult<impl IntoResponse> {
    let companies = source.list_companies(&scope).await?;
    Ok(Json(companies.into_value()))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_companies))
        .with_state(state)
}
