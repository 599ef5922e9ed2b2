//! Backend configuration types shared by the reconfiguration path, the
//! backend controller and the HTTP API.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Augmentation mode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How the backend blends retrieved documents into answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AugmentMode {
    #[default]
    Augment,
    Strict,
    Hybrid,
}

impl AugmentMode {
    /// Parse a mode name. Unknown names fall back to [`AugmentMode::Augment`].
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().trim_matches('\'').to_ascii_lowercase().as_str() {
            "augment" => Self::Augment,
            "strict" => Self::Strict,
            "hybrid" => Self::Hybrid,
            other => {
                tracing::warn!(mode = %other, "unknown augmentation mode, using 'augment'");
                Self::Augment
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Augment => "augment",
            Self::Strict => "strict",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for AugmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Lenient on the way in: config files and API callers never fail on a bad mode.
impl<'de> Deserialize<'de> for AugmentMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconfiguration request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A requested backend configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconfigRequest {
    pub enabled: bool,
    #[serde(default)]
    pub mode: AugmentMode,
    /// Optional model swap applied by the same restart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ReconfigRequest {
    pub fn new(enabled: bool, mode: AugmentMode) -> Self {
        Self {
            enabled,
            mode,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Combine with an older, still-unapplied request: `self` wins, except
    /// that a missing model inherits the older request's model swap.
    pub fn superseding(mut self, older: &ReconfigRequest) -> Self {
        if self.model.is_none() {
            self.model = older.model.clone();
        }
        self
    }
}

/// What the backend is (believed to be) running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub augmentation_enabled: bool,
    pub mode: AugmentMode,
    pub model: String,
}

impl BackendSettings {
    /// Settings after `req` has been applied successfully.
    pub fn applying(&self, req: &ReconfigRequest) -> Self {
        Self {
            augmentation_enabled: req.enabled,
            mode: req.mode,
            model: req.model.clone().unwrap_or_else(|| self.model.clone()),
        }
    }
}

/// Result of a reconfiguration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconfigOutcome {
    /// Debounced or deferred; it will be applied later.
    Scheduled,
    /// The backend was restarted with the requested settings.
    Applied,
    /// Another reconfiguration holds the restart gate; retry later.
    Busy,
    /// The restart failed.
    Rejected { reason: String },
    /// A newer request was applied first; this one was dropped.
    Superseded,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Coarse state of the model-serving backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Ready,
    Loading,
    Starting,
    NotStarted,
    Slow,
    NotInstalled,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub state: ServiceState,
    pub message: String,
}

impl BackendStatus {
    pub fn new(state: ServiceState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == ServiceState::Ready
    }
}
