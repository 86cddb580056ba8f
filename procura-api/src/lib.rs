//! Procura API - REST Layer and Cache Invalidation
//!
//! Axum server in front of the cached data source. In demo mode records come
//! from the flat JSON store; in remote mode they are proxied to a peer that
//! speaks the same contracts. Every write triggers a full invalidation.

pub mod cached_source;
pub mod config;
pub mod error;
pub mod extractors;
pub mod macros;
pub mod remote;
pub mod revalidate;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use cached_source::CachedSource;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use extractors::{Scope, COMPANY_HEADER};
pub use remote::RemoteClient;
pub use revalidate::HttpRevalidator;
pub use routes::create_api_router;
pub use state::AppState;
