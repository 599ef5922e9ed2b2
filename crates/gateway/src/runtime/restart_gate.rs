//! Mutual exclusion for backend restarts.
//!
//! A `Semaphore(1)`: acquiring the permit grants the exclusive right to
//! restart the backend; it auto-releases on drop. Acquisition never waits,
//! a held gate is reported to the caller instead.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct RestartGate {
    sem: Arc<Semaphore>,
}

impl Default for RestartGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RestartGate {
    pub fn new() -> Self {
        Self {
            sem: Arc::new(Semaphore::new(1)),
        }
    }

    /// Take the gate if it is free.
    pub fn try_acquire(&self) -> Result<OwnedSemaphorePermit, GateBusy> {
        self.sem.clone().try_acquire_owned().map_err(|_| GateBusy)
    }

    pub fn is_held(&self) -> bool {
        self.sem.available_permits() == 0
    }
}

/// Returned when a restart is already in progress.
#[derive(Debug, thiserror::Error)]
#[error("a backend restart is already in progress")]
pub struct GateBusy;
