use serde::{Deserialize, Serialize};

use crate::backend::AugmentMode;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconfiguration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconfigConfig {
    /// Debounce window for reconfiguration requests. `0` applies idle
    /// requests immediately.
    #[serde(default = "d_debounce_ms")]
    pub debounce_ms: u64,
    /// Desired augmentation state at startup.
    #[serde(default)]
    pub augmentation_enabled: bool,
    #[serde(default)]
    pub mode: AugmentMode,
    /// Restart the backend at boot if it does not match the desired state.
    #[serde(default = "d_true")]
    pub sync_on_startup: bool,
}

impl Default for ReconfigConfig {
    fn default() -> Self {
        Self {
            debounce_ms: d_debounce_ms(),
            augmentation_enabled: false,
            mode: AugmentMode::Augment,
            sync_on_startup: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Capacity of the bounded queue between workers and the consumer.
    #[serde(default = "d_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: d_queue_capacity(),
        }
    }
}

fn d_debounce_ms() -> u64 {
    1_000
}
fn d_true() -> bool {
    true
}
fn d_queue_capacity() -> usize {
    256
}
