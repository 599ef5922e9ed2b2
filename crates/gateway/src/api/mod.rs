pub mod backend;
pub mod conversation;
pub mod events;
pub mod generations;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(backend::health))
        // Generations
        .route("/v1/generations", post(generations::start))
        .route(
            "/v1/generations/:id",
            get(generations::status).delete(generations::cancel),
        )
        // Delivery
        .route("/v1/events", get(events::stream))
        // Backend
        .route("/v1/backend", get(backend::describe))
        .route("/v1/backend/reconfigure", post(backend::reconfigure))
        .route("/v1/models", get(backend::list_models))
        // Conversation history
        .route(
            "/v1/conversation",
            get(conversation::recent).delete(conversation::clear),
        )
}

/// `{ "error": ... }` response with the given status.
pub(crate) fn api_error(code: StatusCode, msg: impl Into<String>) -> axum::response::Response {
    (code, Json(serde_json::json!({ "error": msg.into() }))).into_response()
}
