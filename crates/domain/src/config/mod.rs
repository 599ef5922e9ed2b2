mod backend;
mod generation;
mod observability;
mod reconfig;
mod server;
mod store;

pub use backend::*;
pub use generation::*;
pub use observability::*;
pub use reconfig::*;
pub use server::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub reconfig: ReconfigConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |severity, field: &str, message: &str| {
            errors.push(ConfigError {
                severity,
                field: field.into(),
                message: message.into(),
            });
        };

        if self.server.port == 0 {
            push(ConfigSeverity::Error, "server.port", "port must be greater than 0");
        }
        if self.server.host.is_empty() {
            push(ConfigSeverity::Error, "server.host", "host must not be empty");
        }
        if self.backend.base_url.is_empty() {
            push(ConfigSeverity::Error, "backend.base_url", "base_url must not be empty");
        } else if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            push(
                ConfigSeverity::Error,
                "backend.base_url",
                "base_url must start with http:// or https://",
            );
        }
        if self.backend.model.trim().is_empty() {
            push(ConfigSeverity::Error, "backend.model", "model must not be empty");
        }
        if self.delivery.queue_capacity == 0 {
            push(
                ConfigSeverity::Error,
                "delivery.queue_capacity",
                "queue capacity must be greater than 0",
            );
        }
        if self.generation.context_limit == 0 {
            push(
                ConfigSeverity::Warning,
                "generation.context_limit",
                "context_limit is 0; conversations will have no memory",
            );
        }
        if self.generation.context_turns > self.generation.context_limit {
            push(
                ConfigSeverity::Warning,
                "generation.context_turns",
                "context_turns exceeds context_limit; only context_limit turns are available",
            );
        }
        if self.reconfig.augmentation_enabled && self.backend.systemd.rag_path.is_none() {
            push(
                ConfigSeverity::Warning,
                "backend.systemd.rag_path",
                "augmentation is enabled but no rag_path is configured",
            );
        }
        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            push(
                ConfigSeverity::Error,
                "observability.sample_rate",
                "sample_rate must be between 0.0 and 1.0",
            );
        }

        errors
    }
}
