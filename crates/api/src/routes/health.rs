//! Liveness and dependency probes.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::identity::HealthReport;
use crate::state::AppState;

/// Service banner.
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "DripHub backend is running" }))
}

/// Liveness health check endpoint.
///
/// Does not check dependencies.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness check against the user store.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn database(State(state): State<AppState>) -> Result<Json<Value>> {
    state.users().ping().await.map_err(|e| {
        tracing::warn!(error = %e, "Database health check failed");
        AppError::ServiceUnavailable("Database unreachable".to_string())
    })?;

    Ok(Json(json!({ "status": "ok", "db": "reachable" })))
}

/// Advisory probe of the identity provider.
///
/// 404 when running with local credentials only, 503 when the provider does
/// not answer on any candidate path.
pub async fn provider(State(state): State<AppState>) -> Result<Json<HealthReport>> {
    let client = state
        .provider()
        .ok_or_else(|| AppError::NotFound("Identity provider not configured".to_string()))?;

    let report = client.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Identity provider health check failed");
        AppError::ServiceUnavailable("Identity provider unreachable".to_string())
    })?;

    Ok(Json(report))
}
