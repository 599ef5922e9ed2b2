//! Shared generation bookkeeping.
//!
//! One lock guards both the current generation id and the pending
//! reconfiguration, so "nothing is active, take the pending request" is a
//! single atomic step.

use parking_lot::Mutex;

use hearth_domain::backend::ReconfigRequest;
use hearth_domain::generation::GenerationId;

/// A reconfiguration request tagged with the order it was received in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped {
    pub seq: u64,
    pub request: ReconfigRequest,
}

impl Stamped {
    pub fn new(seq: u64, request: ReconfigRequest) -> Self {
        Self { seq, request }
    }

    /// Fold two unapplied requests into one. The later one wins; a missing
    /// model swap is inherited from the earlier one.
    pub fn merge(self, other: Stamped) -> Stamped {
        let (newer, older) = if self.seq >= other.seq {
            (self, other)
        } else {
            (other, self)
        };
        Stamped {
            seq: newer.seq,
            request: newer.request.superseding(&older.request),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    current: Option<GenerationId>,
    pending: Option<Stamped>,
}

/// Tracks which generation is current and which reconfiguration waits for
/// it to finish.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `id` the current generation, superseding any other.
    pub fn set(&self, id: GenerationId) {
        self.state.lock().current = Some(id);
    }

    /// Clear the current generation if it is still `id`. Returns whether it was.
    pub fn clear(&self, id: &GenerationId) -> bool {
        let mut state = self.state.lock();
        if state.current.as_ref() == Some(id) {
            state.current = None;
            true
        } else {
            false
        }
    }

    pub fn is_current(&self, id: &GenerationId) -> bool {
        self.state.lock().current.as_ref() == Some(id)
    }

    pub fn has_active(&self) -> bool {
        self.state.lock().current.is_some()
    }

    pub fn current(&self) -> Option<GenerationId> {
        self.state.lock().current.clone()
    }

    /// Store a reconfiguration to run once no generation is active.
    ///
    /// Last write wins by sequence number, so an older request stored late
    /// never replaces a newer one. A request without a model swap keeps the
    /// model of the request it is merged with.
    pub fn store_pending(&self, req: Stamped) {
        let mut state = self.state.lock();
        let req = match state.pending.take() {
            Some(other) => req.merge(other),
            None => req,
        };
        state.pending = Some(req);
    }

    pub fn pending(&self) -> Option<ReconfigRequest> {
        self.state.lock().pending.as_ref().map(|p| p.request.clone())
    }

    /// Take the pending request, but only while no generation is active.
    pub fn take_pending_if_idle(&self) -> Option<Stamped> {
        let mut state = self.state.lock();
        if state.current.is_some() {
            return None;
        }
        state.pending.take()
    }
}
