//! Explicit cache invalidation endpoint.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use procura_storage::InvalidationCoordinator;
use std::sync::Arc;

/// POST|GET /cache/clear - Clear every cache domain and revalidate pages
pub async fn clear_cache(
    State(invalidation): State<Arc<InvalidationCoordinator>>,
) -> impl IntoResponse {
    Json(invalidation.clear_all().await)
}

pub fn create_router(invalidation: Arc<InvalidationCoordinator>) -> Router {
    Router::new()
        .route("/clear", get(clear_cache).post(clear_cache))
        .with_state(invalidation)
}
