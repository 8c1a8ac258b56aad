//! Liveness endpoint.

use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub success: bool,
    pub status: &'static str,
    pub timestamp: String,
    /// `connected` or `unavailable` (webhook-only mode).
    pub storage: &'static str,
}

/// GET /api/health: always OK while the process is serving.
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        success: true,
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        storage: if state.storage.is_available() {
            "connected"
        } else {
            "unavailable"
        },
    })
}
