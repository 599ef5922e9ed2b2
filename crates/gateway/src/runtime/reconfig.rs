//! Backend reconfiguration: debouncing, deferral behind active
//! generations, and serialized restarts.
//!
//! A request is never applied while a generation is streaming. It is parked
//! in the [`SessionRegistry`] and picked up by the completion hook of the
//! generation that blocked it. Requests arriving in quick succession collapse
//! into one restart via a trailing-edge debounce timer, and the
//! [`RestartGate`] guarantees that at most one restart runs at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::AbortHandle;

use hearth_domain::backend::{BackendSettings, ReconfigOutcome, ReconfigRequest};
use hearth_domain::generation::Notification;
use hearth_domain::trace::TraceEvent;

use super::delivery::DeliveryQueue;
use super::registry::{SessionRegistry, Stamped};
use super::restart_gate::RestartGate;
use crate::backend::BackendController;

/// Shortest timer used when retrying behind a held gate.
const MIN_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Debouncing,
    Deferred,
    Applying,
}

struct Debounce {
    handle: AbortHandle,
    request: Stamped,
    epoch: u64,
}

struct Shared {
    registry: Arc<SessionRegistry>,
    delivery: DeliveryQueue,
    controller: Arc<dyn BackendController>,
    gate: RestartGate,
    window: Duration,
    settings: Mutex<BackendSettings>,
    debounce: Mutex<Option<Debounce>>,
    epoch: AtomicU64,
    /// Source of request sequence numbers.
    seq: AtomicU64,
    /// Sequence number of the newest request a restart was started for.
    /// Only written while the gate is held.
    started: AtomicU64,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(d) = self.debounce.get_mut().take() {
            d.handle.abort();
        }
    }
}

#[derive(Clone)]
pub struct ReconfigurationCoordinator {
    shared: Arc<Shared>,
}

impl ReconfigurationCoordinator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        delivery: DeliveryQueue,
        controller: Arc<dyn BackendController>,
        initial: BackendSettings,
        debounce_window: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                delivery,
                controller,
                gate: RestartGate::new(),
                window: debounce_window,
                settings: Mutex::new(initial),
                debounce: Mutex::new(None),
                epoch: AtomicU64::new(0),
                seq: AtomicU64::new(0),
                started: AtomicU64::new(0),
            }),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────

    /// Settings of the last successful restart (or the initial ones).
    pub fn settings(&self) -> BackendSettings {
        self.shared.settings.lock().clone()
    }

    pub fn state(&self) -> CoordinatorState {
        if self.shared.gate.is_held() {
            CoordinatorState::Applying
        } else if self.shared.debounce.lock().is_some() {
            CoordinatorState::Debouncing
        } else if self.shared.registry.pending().is_some() {
            CoordinatorState::Deferred
        } else {
            CoordinatorState::Idle
        }
    }

    // ── Entry points ──────────────────────────────────────────────────

    /// Ask for a backend reconfiguration.
    ///
    /// Returns `Scheduled` when the change was deferred or debounced; with
    /// a zero debounce window an idle coordinator applies on the spot.
    pub async fn request(&self, req: ReconfigRequest) -> ReconfigOutcome {
        TraceEvent::ReconfigRequested {
            enabled: req.enabled,
            mode: req.mode,
            model: req.model.clone(),
        }
        .emit();
        let mut req = self.stamp(req);

        if self.shared.registry.has_active() {
            self.defer(req);
            return ReconfigOutcome::Scheduled;
        }
        // The generation that parked a request has finished but its hook
        // has not picked it up yet. This request replaces it.
        if let Some(parked) = self.shared.registry.take_pending_if_idle() {
            req = req.merge(parked);
        }
        if !self.shared.window.is_zero() || self.shared.gate.is_held() {
            self.schedule_debounce(req);
            return ReconfigOutcome::Scheduled;
        }
        self.apply(req).await
    }

    /// Apply without debouncing. Fails fast with `Busy` if a restart is
    /// already running.
    pub async fn apply_now(&self, req: ReconfigRequest) -> ReconfigOutcome {
        let req = self.stamp(req);
        self.apply(req).await
    }

    /// Bring the backend in line with `desired` at boot, restarting only if
    /// its augmentation state differs. Returns `None` when nothing had to
    /// be done.
    pub async fn sync_on_startup(&self, desired: ReconfigRequest) -> Option<ReconfigOutcome> {
        match self
            .shared
            .controller
            .currently_configured_for(desired.enabled)
            .await
        {
            Ok(true) => {
                let mut settings = self.shared.settings.lock();
                *settings = settings.applying(&desired);
                tracing::info!(
                    augmentation = desired.enabled,
                    "backend already configured, no restart needed"
                );
                None
            }
            Ok(false) => {
                tracing::info!(
                    augmentation = desired.enabled,
                    "backend configuration differs, restarting"
                );
                Some(self.apply_now(desired).await)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to sync backend state on startup");
                None
            }
        }
    }

    /// Completion hook, run by a generation right after it stops being
    /// current. Consumes the pending request if nothing else is active.
    pub fn on_generation_finished(&self) {
        let Some(req) = self.shared.registry.take_pending_if_idle() else {
            return;
        };
        tracing::info!(
            augmentation = req.request.enabled,
            mode = %req.request.mode,
            seq = req.seq,
            "applying deferred reconfiguration"
        );
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.evaluate(req).await;
            tracing::debug!(?outcome, "deferred reconfiguration evaluated");
        });
    }

    /// Abort a pending debounce timer. Its request is discarded.
    pub fn shutdown(&self) {
        if let Some(d) = self.shared.debounce.lock().take() {
            d.handle.abort();
        }
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn stamp(&self, request: ReconfigRequest) -> Stamped {
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed) + 1;
        Stamped::new(seq, request)
    }

    /// A restart for a newer request has already started.
    fn is_stale(&self, req: &Stamped) -> bool {
        req.seq <= self.shared.started.load(Ordering::Acquire)
    }

    /// Re-run the decision for a request that was parked or debounced.
    async fn evaluate(&self, req: Stamped) -> ReconfigOutcome {
        if self.is_stale(&req) {
            tracing::debug!(seq = req.seq, "dropping reconfiguration superseded by a newer restart");
            return ReconfigOutcome::Superseded;
        }
        if self.shared.registry.has_active() {
            emit_deferred(&req.request);
            self.shared.registry.store_pending(req);
            return ReconfigOutcome::Scheduled;
        }
        if self.shared.gate.is_held() {
            self.schedule_debounce(req);
            return ReconfigOutcome::Scheduled;
        }
        match self.apply(req.clone()).await {
            ReconfigOutcome::Busy => {
                self.schedule_debounce(req);
                ReconfigOutcome::Scheduled
            }
            other => other,
        }
    }

    fn defer(&self, req: Stamped) {
        // A debounce in flight holds another unapplied request; fold it in.
        let req = match self.shared.debounce.lock().take() {
            Some(old) => {
                old.handle.abort();
                req.merge(old.request)
            }
            None => req,
        };
        emit_deferred(&req.request);
        self.shared.registry.store_pending(req);
    }

    fn schedule_debounce(&self, req: Stamped) {
        let delay = if self.shared.gate.is_held() {
            self.shared.window.max(MIN_RETRY_DELAY)
        } else {
            self.shared.window
        };
        let epoch = self.shared.epoch.fetch_add(1, Ordering::Relaxed) + 1;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);

        let mut slot = self.shared.debounce.lock();
        let req = match slot.take() {
            Some(old) => {
                old.handle.abort();
                req.merge(old.request)
            }
            None => req,
        };
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            ReconfigurationCoordinator { shared }
                .on_debounce_elapsed(epoch)
                .await;
        });
        tracing::debug!(
            delay_ms = delay.as_millis() as u64,
            epoch,
            seq = req.seq,
            "debounce timer (re)started"
        );
        *slot = Some(Debounce {
            handle: task.abort_handle(),
            request: req,
            epoch,
        });
    }

    async fn on_debounce_elapsed(&self, epoch: u64) {
        let req = {
            let mut slot = self.shared.debounce.lock();
            match slot.as_ref() {
                Some(d) if d.epoch == epoch => slot.take().map(|d| d.request),
                _ => None,
            }
        };
        if let Some(req) = req {
            let outcome = self.evaluate(req).await;
            tracing::debug!(?outcome, epoch, "debounced reconfiguration evaluated");
        }
    }

    async fn apply(&self, stamped: Stamped) -> ReconfigOutcome {
        let Ok(permit) = self.shared.gate.try_acquire() else {
            tracing::info!("reconfiguration rejected: restart already in progress");
            return ReconfigOutcome::Busy;
        };
        if self.is_stale(&stamped) {
            tracing::debug!(seq = stamped.seq, "dropping reconfiguration superseded by a newer restart");
            return ReconfigOutcome::Superseded;
        }
        // A generation may have started since the caller checked.
        if self.shared.registry.has_active() {
            drop(permit);
            self.defer(stamped);
            return ReconfigOutcome::Scheduled;
        }
        self.shared.started.store(stamped.seq, Ordering::Release);
        let req = stamped.request;

        let started = Instant::now();
        let result = self.shared.controller.restart(&req).await;
        let success = result.is_ok();

        let outcome = match result {
            Ok(()) => {
                let settings = {
                    let mut current = self.shared.settings.lock();
                    *current = current.applying(&req);
                    current.clone()
                };
                self.shared
                    .delivery
                    .publish(Notification::BackendReconfigured { settings })
                    .await;
                ReconfigOutcome::Applied
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(error = %reason, "backend restart failed");
                self.shared
                    .delivery
                    .publish(Notification::BackendReconfigureFailed {
                        reason: reason.clone(),
                    })
                    .await;
                ReconfigOutcome::Rejected { reason }
            }
        };

        TraceEvent::ReconfigApplied {
            enabled: req.enabled,
            mode: req.mode,
            model: self.settings().model,
            success,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        drop(permit);
        outcome
    }
}

fn emit_deferred(req: &ReconfigRequest) {
    TraceEvent::ReconfigDeferred {
        enabled: req.enabled,
        mode: req.mode,
    }
    .emit();
}
