//! Live generation handles: a cancellation token plus the lifecycle status
//! for every generation whose worker has not finished yet.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use hearth_domain::generation::{GenerationId, GenerationStatus};

struct LiveGeneration {
    token: CancellationToken,
    status: GenerationStatus,
}

#[derive(Default)]
pub struct CancelMap {
    live: Mutex<HashMap<GenerationId, LiveGeneration>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new generation in `Pending` and return its token.
    pub fn register(&self, id: &GenerationId) -> CancellationToken {
        let token = CancellationToken::new();
        self.live.lock().insert(
            id.clone(),
            LiveGeneration {
                token: token.clone(),
                status: GenerationStatus::Pending,
            },
        );
        token
    }

    /// Signal cancellation. Returns true if the generation was live.
    pub fn cancel(&self, id: &GenerationId) -> bool {
        match self.live.lock().get(id) {
            Some(gen) => {
                gen.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Advance the status. Backward or post-terminal moves are ignored.
    pub fn advance(&self, id: &GenerationId, next: GenerationStatus) -> bool {
        let mut live = self.live.lock();
        match live.get_mut(id) {
            Some(gen) if gen.status.can_advance_to(next) => {
                gen.status = next;
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, id: &GenerationId) -> Option<GenerationStatus> {
        self.live.lock().get(id).map(|g| g.status)
    }

    /// Forget a generation (called when its worker finishes).
    pub fn remove(&self, id: &GenerationId) {
        self.live.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
