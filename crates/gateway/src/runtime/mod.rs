//! Core runtime: generation workers, the delivery queue and backend
//! reconfiguration, tied together by the [`Hearth`] facade.

pub mod cancel;
pub mod delivery;
pub mod generation;
pub mod prompt;
pub mod reconfig;
pub mod registry;
pub mod restart_gate;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use hearth_domain::backend::{BackendSettings, ReconfigOutcome, ReconfigRequest};
use hearth_domain::config::Config;
use hearth_domain::generation::{GenerationId, GenerationStatus};
use hearth_providers::InferenceBackend;
use hearth_sessions::ConversationStore;

use crate::backend::BackendController;

pub use delivery::{drain, BroadcastSink, DeliveryQueue, EventSink};
pub use generation::{GenerationOutcome, GenerationService, GenerationTicket};
pub use reconfig::{CoordinatorState, ReconfigurationCoordinator};
pub use registry::SessionRegistry;

/// The transport-independent core API.
#[derive(Clone)]
pub struct Hearth {
    generations: GenerationService,
    coordinator: ReconfigurationCoordinator,
    store: Arc<dyn ConversationStore>,
    registry: Arc<SessionRegistry>,
    context_limit: usize,
}

impl Hearth {
    /// Wire the runtime from `config` and its collaborators. Also returns
    /// the delivery consumer's handle; it finishes once every `Hearth`
    /// clone is dropped.
    pub fn build(
        config: &Config,
        backend: Arc<dyn InferenceBackend>,
        controller: Arc<dyn BackendController>,
        store: Arc<dyn ConversationStore>,
        sink: Arc<dyn EventSink>,
    ) -> (Self, JoinHandle<u64>) {
        let registry = Arc::new(SessionRegistry::new());
        let (delivery, consumer) =
            DeliveryQueue::spawn(config.delivery.queue_capacity, registry.clone(), sink);

        let initial = BackendSettings {
            augmentation_enabled: config.reconfig.augmentation_enabled,
            mode: config.reconfig.mode,
            model: config.backend.model.clone(),
        };
        let coordinator = ReconfigurationCoordinator::new(
            registry.clone(),
            delivery.clone(),
            controller,
            initial,
            Duration::from_millis(config.reconfig.debounce_ms),
        );
        let generations = GenerationService::new(
            backend,
            store.clone(),
            registry.clone(),
            delivery,
            coordinator.clone(),
            config.generation.clone(),
            config.backend.reasoning_enabled,
        );

        let hearth = Self {
            generations,
            coordinator,
            store,
            registry,
            context_limit: config.generation.context_limit,
        };
        (hearth, consumer)
    }

    /// Start a generation with the stored conversation as context. History
    /// that cannot be read is logged and treated as empty.
    pub async fn start_generation(&self, message: String) -> GenerationTicket {
        let context = match self.store.recent_context(self.context_limit).await {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load conversation context");
                Vec::new()
            }
        };
        self.generations.start(message, context)
    }

    pub fn cancel_generation(&self, id: &GenerationId) -> bool {
        self.generations.cancel(id)
    }

    pub fn generation_status(&self, id: &GenerationId) -> Option<GenerationStatus> {
        self.generations.status(id)
    }

    pub fn current_generation(&self) -> Option<GenerationId> {
        self.registry.current()
    }

    pub async fn set_reconfiguration(&self, req: ReconfigRequest) -> ReconfigOutcome {
        self.coordinator.request(req).await
    }

    pub fn coordinator(&self) -> &ReconfigurationCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }
}
