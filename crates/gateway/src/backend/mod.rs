//! Control over the process that serves the model.

pub mod systemd;
pub mod unit;

use hearth_domain::backend::{BackendStatus, ReconfigRequest};
use hearth_domain::error::Result;

pub use systemd::{CommandOutput, CommandRunner, Systemctl, SystemdController};

/// Restarts and inspects the model server.
#[async_trait::async_trait]
pub trait BackendController: Send + Sync {
    /// Restart the backend with the requested augmentation settings (and
    /// model, when the request carries one).
    async fn restart(&self, req: &ReconfigRequest) -> Result<()>;

    /// Whether the backend is already set up with augmentation `enabled`.
    async fn currently_configured_for(&self, enabled: bool) -> Result<bool>;

    /// Service state plus API readiness.
    async fn status(&self) -> BackendStatus;
}
