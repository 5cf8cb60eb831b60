//! Liveness and readiness endpoints: a lightweight `/health` and a
//! dependency-checking `/ready`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub postgres: ComponentStatus,
    pub redis: ComponentStatus,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let health = state.db.health_check().await;

    let postgres = ComponentStatus {
        name: "PostgreSQL".to_string(),
        status: if health.postgres { "healthy" } else { "unhealthy" }.to_string(),
    };
    let redis = ComponentStatus {
        name: "Redis".to_string(),
        status: if health.redis { "healthy" } else { "unhealthy" }.to_string(),
    };

    let status_code = if health.healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let status = if health.healthy { "ready" } else { "not_ready" }.to_string();

    (status_code, Json(ReadinessResponse { status, postgres, redis }))
}
