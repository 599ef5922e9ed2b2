use serde::Serialize;

use crate::backend::AugmentMode;
use crate::generation::{GenerationId, GenerationStatus};

/// Structured trace events emitted across all Hearth crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    GenerationStarted {
        generation_id: GenerationId,
        context_turns: usize,
        message_chars: usize,
    },
    GenerationFinished {
        generation_id: GenerationId,
        status: GenerationStatus,
        content_chars: usize,
        reasoning_chars: usize,
        dropped_deltas: usize,
        persisted: bool,
        duration_ms: u64,
    },
    BackendRequest {
        model: String,
        reasoning: bool,
        status: u16,
        duration_ms: u64,
    },
    ReconfigRequested {
        enabled: bool,
        mode: AugmentMode,
        model: Option<String>,
    },
    ReconfigDeferred {
        enabled: bool,
        mode: AugmentMode,
    },
    ReconfigApplied {
        enabled: bool,
        mode: AugmentMode,
        model: String,
        success: bool,
        duration_ms: u64,
    },
    TranscriptAppend {
        path: String,
        lines: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "hearth_event");
    }
}
