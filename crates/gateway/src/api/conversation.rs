//! Conversation history endpoints.
//!
//! - `GET    /v1/conversation?limit=N`: most recent turns, oldest first
//! - `DELETE /v1/conversation`        : forget the history

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use super::api_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

pub async fn recent(
    State(state): State<AppState>,
    Query(q): Query<RecentQuery>,
) -> impl IntoResponse {
    let limit = q.limit.min(500);
    match state.hearth.store().recent_context(limit).await {
        Ok(turns) => Json(serde_json::json!({
            "count": turns.len(),
            "turns": turns,
        }))
        .into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn clear(State(state): State<AppState>) -> impl IntoResponse {
    match state.hearth.store().clear().await {
        Ok(()) => {
            tracing::info!("conversation history cleared");
            Json(serde_json::json!({ "cleared": true })).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
