//! Procura API Server Entry Point
//!
//! Loads configuration, opens the data source for the configured mode, and
//! starts the Axum HTTP server.

use axum::Router;
use procura_api::telemetry::{init_tracing, TelemetryConfig};
use procura_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = ApiConfig::from_env()?;
    let addr = config.bind_addr()?;

    let state = AppState::from_config(config).await?;
    let app: Router = create_api_router(state);

    tracing::info!(%addr, "Starting Procura API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
