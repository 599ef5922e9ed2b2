//! Backend endpoints.
//!
//! - `GET  /health`                 : liveness
//! - `GET  /v1/backend`             : settings, coordinator state, service status
//! - `POST /v1/backend/reconfigure` : request an augmentation change
//! - `GET  /v1/models`              : models served by the backend

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use hearth_domain::backend::{ReconfigOutcome, ReconfigRequest};

use super::api_error;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

pub async fn describe(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.controller.status().await;
    let coordinator = state.hearth.coordinator();
    Json(serde_json::json!({
        "settings": coordinator.settings(),
        "reconfiguration": coordinator.state(),
        "status": status,
        "current_generation": state.hearth.current_generation(),
        "unit": state.config.backend.systemd.unit,
        "debounce_ms": state.config.reconfig.debounce_ms,
    }))
}

pub async fn reconfigure(
    State(state): State<AppState>,
    Json(req): Json<ReconfigRequest>,
) -> impl IntoResponse {
    let outcome = state.hearth.set_reconfiguration(req).await;
    let code = match &outcome {
        ReconfigOutcome::Scheduled => StatusCode::ACCEPTED,
        ReconfigOutcome::Applied | ReconfigOutcome::Superseded => StatusCode::OK,
        ReconfigOutcome::Busy => StatusCode::CONFLICT,
        ReconfigOutcome::Rejected { .. } => StatusCode::BAD_GATEWAY,
    };
    (code, Json(outcome))
}

pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    match state.backend.list_models().await {
        Ok(models) => Json(serde_json::json!({
            "backend": state.backend.backend_id(),
            "configured": state.hearth.coordinator().settings().model,
            "models": models,
        }))
        .into_response(),
        Err(e) => api_error(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}
