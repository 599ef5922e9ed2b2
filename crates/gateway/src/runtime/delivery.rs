//! Single-consumer delivery of notifications.
//!
//! Every outward event (answer deltas, completions, backend changes) goes
//! through one bounded queue drained by exactly one consumer task, which
//! stamps each event with a sequence number and hands it to an
//! [`EventSink`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use hearth_domain::generation::{Envelope, Notification};

use super::registry::SessionRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sinks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where delivered notifications end up (SSE subscribers, a terminal, a
/// test recorder).
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, envelope: Envelope);
}

/// Fans envelopes out to any number of subscribers. Slow subscribers lag
/// and skip; the consumer never waits on them.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Envelope>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }
}

#[async_trait::async_trait]
impl EventSink for BroadcastSink {
    async fn deliver(&self, envelope: Envelope) {
        // No subscribers is fine.
        let _ = self.tx.send(envelope);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Queued {
    notification: Notification,
    /// Model output that must not surface once its generation is superseded.
    live_only: bool,
}

/// Producer handle of the delivery queue. Cheap to clone.
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::Sender<Queued>,
}

impl DeliveryQueue {
    /// Create the queue and spawn its consumer. The consumer runs until
    /// every producer handle is dropped and returns the number of
    /// envelopes it delivered.
    pub fn spawn(
        capacity: usize,
        registry: Arc<SessionRegistry>,
        sink: Arc<dyn EventSink>,
    ) -> (Self, JoinHandle<u64>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(consume(rx, registry, sink));
        (Self { tx }, handle)
    }

    /// Enqueue a notification that is always delivered.
    pub async fn publish(&self, notification: Notification) -> bool {
        self.enqueue(notification, false).await
    }

    /// Enqueue model output. It is dropped at delivery time if another
    /// generation has become current in the meantime.
    pub async fn publish_delta(&self, notification: Notification) -> bool {
        self.enqueue(notification, true).await
    }

    async fn enqueue(&self, notification: Notification, live_only: bool) -> bool {
        let kind = notification.kind();
        match self
            .tx
            .send(Queued {
                notification,
                live_only,
            })
            .await
        {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(kind, "delivery queue closed, notification dropped");
                false
            }
        }
    }
}

async fn consume(
    mut rx: mpsc::Receiver<Queued>,
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn EventSink>,
) -> u64 {
    let mut seq = 0u64;
    while let Some(item) = rx.recv().await {
        if item.live_only && is_superseded(&registry, &item.notification) {
            tracing::debug!(
                kind = item.notification.kind(),
                "dropping delta of superseded generation"
            );
            continue;
        }
        seq += 1;
        sink.deliver(Envelope {
            seq,
            notification: item.notification,
        })
        .await;
    }
    tracing::debug!(delivered = seq, "delivery consumer stopped");
    seq
}

/// Give the consumer up to `grace` to flush what is queued and stop once the
/// last producer is gone, then abort it. Returns the delivered count when it
/// stopped on its own.
pub async fn drain(mut consumer: JoinHandle<u64>, grace: Duration) -> Option<u64> {
    match tokio::time::timeout(grace, &mut consumer).await {
        Ok(Ok(delivered)) => Some(delivered),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "delivery consumer failed");
            None
        }
        Err(_) => {
            consumer.abort();
            tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                "delivery queue still open after grace period, aborting consumer"
            );
            None
        }
    }
}

fn is_superseded(registry: &SessionRegistry, notification: &Notification) -> bool {
    match (registry.current(), notification.generation_id()) {
        (Some(current), Some(id)) => &current != id,
        _ => false,
    }
}
