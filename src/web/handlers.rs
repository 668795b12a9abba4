//! HTTP request handlers.

use super::AppState;
use crate::store::iso_millis;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde_json::json;

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// ============================================================================
// API: Data
// ============================================================================

/// The stored series, from the primary document or else the fallback.
pub async fn handle_get_data(State(state): State<AppState>) -> impl IntoResponse {
    match state.primary.fetch().await {
        Ok(snapshot) => return Json(snapshot.samples).into_response(),
        Err(e) => tracing::error!("Error fetching from {}: {}", state.primary.repo(), e),
    }

    let Some(fallback) = &state.fallback else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch monitoring data",
        );
    };

    match fallback.fetch().await {
        Ok(snapshot) => Json(snapshot.samples).into_response(),
        Err(e) => {
            tracing::error!("Error fetching from fallback {}: {}", fallback.repo(), e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch monitoring data from both repos",
            )
        }
    }
}

// ============================================================================
// API: Sites
// ============================================================================

pub async fn handle_get_sites(State(state): State<AppState>) -> impl IntoResponse {
    match state.registry.load() {
        Ok(targets) => Json(targets).into_response(),
        Err(e) => {
            tracing::error!("Error loading targets: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

// ============================================================================
// Health
// ============================================================================

pub async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": iso_millis::format(&Utc::now()),
    }))
}
