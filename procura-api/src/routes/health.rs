//! Health endpoints: `/ping` and `/live` answer while the process runs,
//! `/ready` also checks that the data source answers.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use procura_storage::StorageMode;
use serde::Serialize;
use std::time::Instant;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Body of `/health/ready`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub status: HealthStatus,
    pub mode: StorageMode,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn ping() -> &'static str {
    "pong"
}

async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": HealthStatus::Healthy }))
}

async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let start = Instant::now();
    let check = state.source.source().health_check().await;

    let (status, latency_ms, error) = match check {
        Ok(()) => (
            HealthStatus::Healthy,
            Some(start.elapsed().as_millis() as u64),
            None,
        ),
        Err(e) => (HealthStatus::Unhealthy, None, Some(e.to_string())),
    };
    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(Readiness {
            status,
            mode: state.config.mode,
            uptime_seconds: state.start_time.elapsed().as_secs(),
            latency_ms,
            error,
        }),
    )
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}
