use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inference backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The locally hosted, OpenAI-compatible model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Model identifier sent with each request (and used for the system prompt).
    #[serde(default = "d_model")]
    pub model: String,
    /// Request reasoning output. `None` = enable automatically for
    /// reasoning-capable models.
    #[serde(default)]
    pub reasoning_enabled: Option<bool>,
    /// Connect timeout for backend requests. Streaming reads have no timeout.
    #[serde(default = "d_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How long a backend status probe result is reused.
    #[serde(default = "d_status_cache_ms")]
    pub status_cache_ms: u64,
    #[serde(default)]
    pub systemd: SystemdConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            model: d_model(),
            reasoning_enabled: None,
            connect_timeout_ms: d_connect_timeout_ms(),
            status_cache_ms: d_status_cache_ms(),
            systemd: SystemdConfig::default(),
        }
    }
}

/// The user-level systemd unit that runs the model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemdConfig {
    #[serde(default = "d_unit")]
    pub unit: String,
    /// Unit file to rewrite. Defaults to `~/.config/systemd/user/<unit>`.
    #[serde(default)]
    pub unit_path: Option<PathBuf>,
    /// Retrieval database passed as `--rag <path>` when augmentation is on.
    #[serde(default)]
    pub rag_path: Option<PathBuf>,
    /// Timeout for each `systemctl` invocation.
    #[serde(default = "d_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl Default for SystemdConfig {
    fn default() -> Self {
        Self {
            unit: d_unit(),
            unit_path: None,
            rag_path: None,
            command_timeout_ms: d_command_timeout_ms(),
        }
    }
}

impl SystemdConfig {
    /// Resolved unit file path.
    pub fn resolved_unit_path(&self) -> PathBuf {
        match &self.unit_path {
            Some(p) => p.clone(),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("~/.config"))
                .join("systemd/user")
                .join(&self.unit),
        }
    }
}

fn d_base_url() -> String {
    "http://127.0.0.1:8080".into()
}
fn d_model() -> String {
    "llama3.2".into()
}
fn d_connect_timeout_ms() -> u64 {
    30_000
}
fn d_status_cache_ms() -> u64 {
    2_000
}
fn d_unit() -> String {
    "ramalama.service".into()
}
fn d_command_timeout_ms() -> u64 {
    10_000
}
