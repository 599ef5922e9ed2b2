//! Generation workers.
//!
//! `start` registers a new generation as current and returns at once; a
//! spawned worker streams the backend answer, filters deltas that may no
//! longer surface, and always finishes with a `Complete` notification.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use hearth_domain::config::{GenerationConfig, SupersededPolicy};
use hearth_domain::error::Result;
use hearth_domain::generation::{GenerationId, GenerationStatus, Notification};
use hearth_domain::message::Turn;
use hearth_domain::stream::DecoderEvent;
use hearth_domain::trace::TraceEvent;
use hearth_providers::{DeltaStream, InferenceBackend};
use hearth_sessions::ConversationStore;

use super::cancel::CancelMap;
use super::delivery::DeliveryQueue;
use super::prompt::{build_request, reasoning_enabled};
use super::reconfig::ReconfigurationCoordinator;
use super::registry::SessionRegistry;

/// What a finished worker hands back through its join handle.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub id: GenerationId,
    pub status: GenerationStatus,
    pub content: String,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Handle on a started generation.
pub struct GenerationTicket {
    pub id: GenerationId,
    pub handle: JoinHandle<GenerationOutcome>,
}

#[derive(Clone)]
pub struct GenerationService {
    backend: Arc<dyn InferenceBackend>,
    store: Arc<dyn ConversationStore>,
    registry: Arc<SessionRegistry>,
    delivery: DeliveryQueue,
    live: Arc<CancelMap>,
    coordinator: ReconfigurationCoordinator,
    cfg: Arc<GenerationConfig>,
    reasoning: Option<bool>,
}

/// How the backend stream stopped, when it did not fail.
enum Ended {
    Finished,
    Cancelled,
}

/// Accumulated output of one worker.
#[derive(Default)]
struct Streamed {
    content: String,
    reasoning: String,
    dropped: usize,
}

impl GenerationService {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        store: Arc<dyn ConversationStore>,
        registry: Arc<SessionRegistry>,
        delivery: DeliveryQueue,
        coordinator: ReconfigurationCoordinator,
        cfg: GenerationConfig,
        reasoning: Option<bool>,
    ) -> Self {
        Self {
            backend,
            store,
            registry,
            delivery,
            live: Arc::new(CancelMap::new()),
            coordinator,
            cfg: Arc::new(cfg),
            reasoning,
        }
    }

    /// Start a generation for `message` and make it current. Returns
    /// before any backend I/O happens.
    pub fn start(&self, message: String, context: Vec<Turn>) -> GenerationTicket {
        let id = GenerationId::next();
        let token = self.live.register(&id);
        self.registry.set(id.clone());

        TraceEvent::GenerationStarted {
            generation_id: id.clone(),
            context_turns: context.len(),
            message_chars: message.chars().count(),
        }
        .emit();

        let span = tracing::info_span!("generation", generation_id = %id);
        let worker = self.clone();
        let worker_id = id.clone();
        let handle = tokio::spawn(
            async move { worker.run(worker_id, token, message, context).await }.instrument(span),
        );
        GenerationTicket { id, handle }
    }

    /// Cancel `id` if it is the current generation. Its worker still
    /// publishes `Complete`.
    pub fn cancel(&self, id: &GenerationId) -> bool {
        if !self.registry.is_current(id) {
            tracing::debug!(generation_id = %id, "cancel ignored: not the current generation");
            return false;
        }
        let cancelled = self.live.cancel(id);
        if cancelled {
            tracing::info!(generation_id = %id, "generation cancelled");
        }
        cancelled
    }

    /// Status of a generation whose worker is still running.
    pub fn status(&self, id: &GenerationId) -> Option<GenerationStatus> {
        self.live.status(id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    // ── Worker ────────────────────────────────────────────────────────

    async fn run(
        self,
        id: GenerationId,
        token: CancellationToken,
        message: String,
        context: Vec<Turn>,
    ) -> GenerationOutcome {
        let started = Instant::now();
        let mut out = Streamed::default();
        let result = self.stream(&id, &token, &message, &context, &mut out).await;

        let cancelled = matches!(result, Ok(Ended::Cancelled));
        let status = match &result {
            Ok(Ended::Cancelled) => GenerationStatus::Cancelled,
            Ok(Ended::Finished) => GenerationStatus::Completed,
            Err(_) => GenerationStatus::Failed,
        };
        let error = match result {
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                self.delivery
                    .publish(Notification::Content {
                        generation_id: id.clone(),
                        text: error_text(&e.to_string()),
                    })
                    .await;
                Some(e.to_string())
            }
            _ => None,
        };

        let persisted = self.persist(&id, &message, &out.content, cancelled).await;

        self.live.advance(&id, status);
        self.registry.clear(&id);
        self.delivery
            .publish(Notification::Complete {
                generation_id: id.clone(),
                status,
            })
            .await;
        self.coordinator.on_generation_finished();
        self.live.remove(&id);

        TraceEvent::GenerationFinished {
            generation_id: id.clone(),
            status,
            content_chars: out.content.chars().count(),
            reasoning_chars: out.reasoning.chars().count(),
            dropped_deltas: out.dropped,
            persisted,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        GenerationOutcome {
            id,
            status,
            content: out.content,
            reasoning: out.reasoning,
            error,
        }
    }

    /// Open the backend stream and forward deltas until it ends, fails, or
    /// the generation is cancelled. A cancel that arrives after the body
    /// has ended does not change the result.
    async fn stream(
        &self,
        id: &GenerationId,
        token: &CancellationToken,
        message: &str,
        context: &[Turn],
        out: &mut Streamed,
    ) -> Result<Ended> {
        let model = self.coordinator.settings().model;
        let reasoning = reasoning_enabled(self.reasoning, &model);
        let request = build_request(&self.cfg, &model, reasoning, context, message);

        let body = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(Ended::Cancelled),
            body = self.backend.chat_stream(&request) => body?,
        };
        self.live.advance(id, GenerationStatus::Streaming);

        let mut deltas = DeltaStream::new(body);
        loop {
            // Dropping `deltas` on cancel closes the response body.
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(Ended::Cancelled),
                event = deltas.next() => event,
            };
            let notification = match event {
                None | Some(Ok(DecoderEvent::Done)) => return Ok(Ended::Finished),
                Some(Err(e)) => return Err(e),
                Some(Ok(DecoderEvent::ContentDelta { text })) => {
                    out.content.push_str(&text);
                    Notification::Content {
                        generation_id: id.clone(),
                        text,
                    }
                }
                Some(Ok(DecoderEvent::ReasoningDelta { text })) => {
                    out.reasoning.push_str(&text);
                    Notification::Reasoning {
                        generation_id: id.clone(),
                        text,
                    }
                }
            };

            if token.is_cancelled() || !self.registry.is_current(id) {
                out.dropped += 1;
                continue;
            }
            self.delivery.publish_delta(notification).await;
        }
    }

    async fn persist(
        &self,
        id: &GenerationId,
        message: &str,
        content: &str,
        cancelled: bool,
    ) -> bool {
        if content.is_empty() || cancelled {
            return false;
        }
        let superseded = !self.registry.is_current(id);
        if superseded && self.cfg.superseded_policy == SupersededPolicy::Discard {
            tracing::debug!("superseded generation not persisted");
            return false;
        }
        match self.store.append(message, content).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist conversation turn");
                false
            }
        }
    }
}

fn error_text(error: &str) -> String {
    format!(
        "\n\nError: {error}\n\nCheck that the model server is running, then try again."
    )
}
