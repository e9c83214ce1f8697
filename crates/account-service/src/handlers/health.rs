//! Service banner and health handlers.

use crate::db;
use crate::models::{HealthResponse, ServiceInfo};
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

/// GET /
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Account Service API",
        status: "running",
    })
}

/// Health check.
///
/// Returns 200 when the database answers, 503 otherwise. The body never
/// carries the underlying error.
///
/// GET /health
#[tracing::instrument(skip_all, name = "account.health")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    if db::ping(&state.pool).await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                api_version: env!("CARGO_PKG_VERSION"),
                database: "healthy",
            }),
        )
    } else {
        tracing::warn!(target: "account.handlers.health", "Health check failed: database unreachable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                api_version: env!("CARGO_PKG_VERSION"),
                database: "unhealthy",
            }),
        )
    }
}
