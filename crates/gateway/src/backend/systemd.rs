//! [`BackendController`] for a model server running as a user-level
//! systemd unit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use hearth_domain::backend::{BackendStatus, ReconfigRequest, ServiceState};
use hearth_domain::config::BackendConfig;
use hearth_domain::error::{Error, Result};
use hearth_providers::InferenceBackend;

use super::unit::{exec_start_has_rag, UnitChange, UnitRewriter};
use super::BackendController;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// systemctl invocation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Captured result of one `systemctl` call.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `systemctl --user <args>`.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn systemctl(&self, args: &[&str]) -> Result<CommandOutput>;
}

/// The real `systemctl`, each call bounded by a timeout.
pub struct Systemctl {
    timeout: Duration,
}

impl Systemctl {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl CommandRunner for Systemctl {
    async fn systemctl(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = tokio::process::Command::new("systemctl");
        cmd.arg("--user").args(args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::Timeout(format!("systemctl --user {}", args.join(" "))))??;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Controller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SystemdController {
    unit: String,
    unit_path: PathBuf,
    rag_path: Option<PathBuf>,
    rewriter: UnitRewriter,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn InferenceBackend>,
    status_ttl: Duration,
    status_cache: Mutex<Option<(Instant, BackendStatus)>>,
}

impl SystemdController {
    pub fn new(
        cfg: &BackendConfig,
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn InferenceBackend>,
    ) -> Result<Self> {
        Ok(Self {
            unit: cfg.systemd.unit.clone(),
            unit_path: cfg.systemd.resolved_unit_path(),
            rag_path: cfg.systemd.rag_path.clone(),
            rewriter: UnitRewriter::new()?,
            runner,
            probe,
            status_ttl: Duration::from_millis(cfg.status_cache_ms),
            status_cache: Mutex::new(None),
        })
    }

    async fn read_unit(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.unit_path).await {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::Backend(format!(
                "unit file {} not found",
                self.unit_path.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_unit(&self, content: &str) -> Result<()> {
        let tmp = self.unit_path.with_extension("hearth-tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.unit_path).await?;
        Ok(())
    }

    /// Put the previous unit back after a failed restart so the file keeps
    /// describing the last configuration that was actually applied.
    async fn roll_back(&self, previous: &str) {
        if let Err(e) = self.write_unit(previous).await {
            tracing::error!(
                error = %e,
                path = %self.unit_path.display(),
                "failed to restore unit file after failed restart"
            );
            return;
        }
        if let Err(e) = self.run_checked(&["daemon-reload"]).await {
            tracing::warn!(error = %e, "daemon-reload after unit rollback failed");
        }
        tracing::info!(path = %self.unit_path.display(), "unit file restored");
    }

    async fn run_checked(&self, args: &[&str]) -> Result<()> {
        let out = self.runner.systemctl(args).await.map_err(not_installed_hint)?;
        if out.success {
            Ok(())
        } else {
            Err(Error::Backend(format!(
                "systemctl --user {} failed: {}",
                args.join(" "),
                out.stderr
            )))
        }
    }

    async fn probe_status(&self) -> BackendStatus {
        let active = match self.runner.systemctl(&["is-active", self.unit.as_str()]).await {
            Ok(out) => out.stdout == "active",
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return BackendStatus::new(
                    ServiceState::NotInstalled,
                    "systemctl not found; the model server cannot be managed",
                );
            }
            Err(Error::Timeout(_)) => {
                return BackendStatus::new(
                    ServiceState::Error,
                    "failed to check service status (timeout)",
                );
            }
            Err(e) => return BackendStatus::new(ServiceState::Error, format!("system error: {e}")),
        };

        if !active {
            let show = self
                .runner
                .systemctl(&["show", self.unit.as_str(), "-p", "ActiveState,SubState"])
                .await
                .map(|o| o.stdout)
                .unwrap_or_default();
            return if show.contains("ActiveState=failed") {
                BackendStatus::new(ServiceState::Error, format!("{} failed to start", self.unit))
            } else if show.contains("ActiveState=inactive") {
                BackendStatus::new(
                    ServiceState::NotStarted,
                    format!(
                        "{} is not running; start it with: systemctl --user start {}",
                        self.unit, self.unit
                    ),
                )
            } else {
                BackendStatus::new(ServiceState::Starting, format!("{} is starting", self.unit))
            };
        }

        match self.probe.health().await {
            Ok(true) => BackendStatus::new(ServiceState::Ready, "model loaded and ready"),
            Ok(false) => BackendStatus::new(ServiceState::Loading, "service started, model loading"),
            Err(Error::Timeout(_)) => {
                BackendStatus::new(ServiceState::Slow, "model server is slow to respond")
            }
            // Unit is active but the API is not accepting connections yet.
            Err(Error::Http(_)) => BackendStatus::new(
                ServiceState::Loading,
                "loading model into memory (large models can take minutes)",
            ),
            Err(e) => BackendStatus::new(ServiceState::Error, format!("API error: {e}")),
        }
    }
}

fn not_installed_hint(e: Error) -> Error {
    match e {
        Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            Error::Backend("systemctl not found; is systemd available?".into())
        }
        other => other,
    }
}

#[async_trait::async_trait]
impl BackendController for SystemdController {
    async fn restart(&self, req: &ReconfigRequest) -> Result<()> {
        let rag = if req.enabled {
            Some(self.rag_path.as_deref().ok_or_else(|| {
                Error::Config("augmentation requested but backend.systemd.rag_path is not set".into())
            })?)
        } else {
            None
        };

        let current = self.read_unit().await?;
        let updated = self.rewriter.rewrite(
            &current,
            &UnitChange {
                model: req.model.as_deref(),
                rag,
                mode: req.mode,
            },
        )?;
        let changed = updated != current;
        if changed {
            self.write_unit(&updated).await?;
            tracing::debug!(path = %self.unit_path.display(), "unit file rewritten");
        }

        let restarted = match self.run_checked(&["daemon-reload"]).await {
            Ok(()) => self.run_checked(&["restart", self.unit.as_str()]).await,
            Err(e) => Err(e),
        };
        *self.status_cache.lock() = None;
        if let Err(e) = restarted {
            if changed {
                self.roll_back(&current).await;
            }
            return Err(e);
        }

        tracing::info!(
            unit = %self.unit,
            augmentation = req.enabled,
            mode = %req.mode,
            model = req.model.as_deref().unwrap_or("-"),
            "backend restarted"
        );
        Ok(())
    }

    async fn currently_configured_for(&self, enabled: bool) -> Result<bool> {
        let content = self.read_unit().await?;
        Ok(exec_start_has_rag(&content) == enabled)
    }

    async fn status(&self) -> BackendStatus {
        if let Some((at, status)) = self.status_cache.lock().as_ref() {
            if at.elapsed() < self.status_ttl {
                return status.clone();
            }
        }
        let status = self.probe_status().await;
        *self.status_cache.lock() = Some((Instant::now(), status.clone()));
        status
    }
}
