//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    /// Order events are delivered to a webhook, not only queued
    pub webhook_configured: bool,
}

/// Reports `degraded` when the database is unreachable
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_up = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    if !database_up {
        tracing::warn!("Health check could not reach the database");
    }

    Json(HealthResponse {
        status: if database_up { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: if database_up { "connected" } else { "disconnected" },
        webhook_configured: state.config.notifications.webhook_url.is_some(),
    })
}
