//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::{domain::HubSnapshot, ui::state::AppState};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Counts of sessions and queued hub state
pub async fn hub_status(State(state): State<Arc<AppState>>) -> Json<HubSnapshot> {
    Json(state.session_usecase.status().await)
}
