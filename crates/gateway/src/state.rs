use std::sync::Arc;
use std::time::Instant;

use hearth_domain::config::Config;
use hearth_providers::InferenceBackend;

use crate::backend::BackendController;
use crate::runtime::{BroadcastSink, Hearth};

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub hearth: Hearth,
    pub backend: Arc<dyn InferenceBackend>,
    pub controller: Arc<dyn BackendController>,

    // ── Delivery ──────────────────────────────────────────────────────
    /// SSE subscribers attach here.
    pub events: BroadcastSink,

    pub started_at: Instant,
}
