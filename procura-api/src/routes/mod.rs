//! REST API Routes Module
//!
//! Route handlers organized by resource:
//! - Records (`/resource`), entity lookup (`/entity`), schemas, companies
//! - Relations (`/relations`)
//! - Explicit invalidation (`/cache/clear`)
//! - Health check endpoints (Kubernetes-compatible)
//!
//! Every GET response is marked uncacheable for browsers and intermediaries;
//! freshness is owned by the server cache and its invalidation.

pub mod cache;
pub mod company;
pub mod entity;
pub mod health;
pub mod relations;
pub mod resource;
pub mod schema;

use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, Next},
    response::Response,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::extractors::COMPANY_HEADER;
use crate::state::AppState;

pub use cache::create_router as cache_router;
pub use company::create_router as company_router;
pub use entity::create_router as entity_router;
pub use health::create_router as health_router;
pub use relations::create_router as relations_router;
pub use resource::create_router as resource_router;
pub use schema::create_router as schema_router;

/// Value of `Cache-Control` on every GET response.
pub const NO_STORE: &str = "no-store, no-cache, must-revalidate";

/// Mark GET responses uncacheable.
pub async fn no_store_middleware(request: Request, next: Next) -> Response {
    let is_read = request.method() == Method::GET;
    let mut response = next.run(request).await;
    if is_read {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    }
    response
}

fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(COMPANY_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        // Development mode: allow all origins
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Create the complete API router.
///
/// - Records at /resource/*, entity lookups at /entity/*
/// - Schemas at /schema/* and /schemas, companies at /companies
/// - Relations at /relations
/// - Invalidation at /cache/clear
/// - Health checks at /health/*
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    Router::new()
        .nest("/resource", resource::create_router(state.clone()))
        .nest("/entity", entity::create_router(state.clone()))
        .nest("/companies", company::create_router(state.clone()))
        .nest("/relations", relations::create_router(state.clone()))
        .nest("/cache", cache::create_router(state.invalidation.clone()))
        .nest("/health", health::create_router(state.clone()))
        .merge(schema::create_router(state))
        .layer(from_fn(no_store_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
