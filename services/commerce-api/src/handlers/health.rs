//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use medsupply_types::{ComponentHealth, HealthResponse, HealthStatus};

use crate::state::AppState;

/// Liveness probe - always returns OK if the service is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        components: None,
    })
}

/// Readiness probe - checks database connectivity
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.repos.health.ping().await {
        Ok(()) => ComponentHealth {
            name: "database".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            tracing::error!(error = ?e, "Database health check failed");
            ComponentHealth {
                name: "database".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some("unreachable".to_string()),
            }
        }
    };

    let status = database.status;
    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            components: Some(vec![database]),
        }),
    )
}
