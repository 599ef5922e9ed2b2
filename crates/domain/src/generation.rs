//! Generation identity, lifecycle status and the notifications delivered
//! to the UI.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::backend::BackendSettings;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Last microsecond stamp handed out; ids are strictly increasing.
static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// Opaque identity of one generation (`gen_<unix-micros>`).
///
/// Ids are allocated from a process-wide monotonic clock: two calls in the
/// same microsecond still produce distinct, ordered ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
    /// Allocate a fresh id. Never returns an id handed out before.
    pub fn next() -> Self {
        let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
        let mut last = LAST_STAMP.load(Ordering::Relaxed);
        let stamp = loop {
            let candidate = now.max(last + 1);
            match LAST_STAMP.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break candidate,
                Err(actual) => last = actual,
            }
        };
        Self(format!("gen_{stamp}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GenerationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GenerationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    pub fn can_advance_to(self, next: GenerationStatus) -> bool {
        match self {
            Self::Pending => next != Self::Pending,
            Self::Streaming => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Notifications
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events delivered to the UI through the single delivery queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Notification {
    /// A fragment of the answer for `generation_id`.
    #[serde(rename = "content")]
    Content {
        generation_id: GenerationId,
        text: String,
    },

    /// A fragment of the reasoning text for `generation_id`.
    #[serde(rename = "reasoning")]
    Reasoning {
        generation_id: GenerationId,
        text: String,
    },

    /// Always the last event for its generation.
    #[serde(rename = "complete")]
    Complete {
        generation_id: GenerationId,
        status: GenerationStatus,
    },

    /// The backend was restarted with new settings.
    #[serde(rename = "backend_reconfigured")]
    BackendReconfigured { settings: BackendSettings },

    /// A reconfiguration attempt failed.
    #[serde(rename = "backend_reconfigure_failed")]
    BackendReconfigureFailed { reason: String },
}

impl Notification {
    /// The generation this notification belongs to, if any.
    pub fn generation_id(&self) -> Option<&GenerationId> {
        match self {
            Self::Content { generation_id, .. }
            | Self::Reasoning { generation_id, .. }
            | Self::Complete { generation_id, .. } => Some(generation_id),
            Self::BackendReconfigured { .. } | Self::BackendReconfigureFailed { .. } => None,
        }
    }

    /// Short event name, used as the SSE `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Content { .. } => "content",
            Self::Reasoning { .. } => "reasoning",
            Self::Complete { .. } => "complete",
            Self::BackendReconfigured { .. } => "backend_reconfigured",
            Self::BackendReconfigureFailed { .. } => "backend_reconfigure_failed",
        }
    }
}

/// A notification tagged with its delivery sequence number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub seq: u64,
    #[serde(flatten)]
    pub notification: Notification,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let ids: Vec<GenerationId> = (0..1000).map(|_| GenerationId::next()).collect();
        for pair in ids.windows(2) {
            let a: u64 = pair[0].as_str()["gen_".len()..].parse().unwrap();
            let b: u64 = pair[1].as_str()["gen_".len()..].parse().unwrap();
            assert!(b > a, "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn id_has_gen_prefix() {
        assert!(GenerationId::next().as_str().starts_with("gen_"));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!GenerationStatus::Pending.is_terminal());
        assert!(!GenerationStatus::Streaming.is_terminal());
        assert!(GenerationStatus::Completed.is_terminal());
        assert!(GenerationStatus::Cancelled.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
    }

    #[test]
    fn status_only_moves_forward() {
        use GenerationStatus::*;
        assert!(Pending.can_advance_to(Streaming));
        assert!(Pending.can_advance_to(Failed));
        assert!(Streaming.can_advance_to(Completed));
        assert!(!Streaming.can_advance_to(Pending));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Cancelled.can_advance_to(Completed));
    }

    #[test]
    fn envelope_serializes_flat() {
        let env = Envelope {
            seq: 7,
            notification: Notification::Content {
                generation_id: "gen_1".into(),
                text: "4".into(),
            },
        };
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["seq"], 7);
        assert_eq!(v["type"], "content");
        assert_eq!(v["generation_id"], "gen_1");
        assert_eq!(v["text"], "4");
    }
}
