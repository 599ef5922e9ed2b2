//! Generation endpoints.
//!
//! - `POST   /v1/generations`     : start a generation, returns its id
//! - `GET    /v1/generations/:id` : status of a live generation
//! - `DELETE /v1/generations/:id` : cancel the current generation

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use hearth_domain::generation::GenerationId;

use super::api_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub message: String,
}

pub async fn start(
    State(state): State<AppState>,
    Json(body): Json<StartRequest>,
) -> impl IntoResponse {
    if body.message.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "message must not be empty");
    }
    let ticket = state.hearth.start_generation(body.message).await;
    // The worker runs detached; results arrive on /v1/events.
    drop(ticket.handle);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "generation_id": ticket.id })),
    )
        .into_response()
}

pub async fn status(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = GenerationId::from(id);
    match state.hearth.generation_status(&id) {
        Some(status) => Json(serde_json::json!({
            "generation_id": id,
            "status": status,
            "current": state.hearth.current_generation().as_ref() == Some(&id),
        }))
        .into_response(),
        None => api_error(StatusCode::NOT_FOUND, format!("generation {id} is not running")),
    }
}

pub async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let cancelled = state.hearth.cancel_generation(&GenerationId::from(id));
    Json(serde_json::json!({ "cancelled": cancelled }))
}
