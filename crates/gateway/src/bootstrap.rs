//! AppState construction shared by `serve` and `ask`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::task::JoinHandle;

use hearth_domain::backend::ReconfigRequest;
use hearth_domain::config::{Config, ConfigSeverity};
use hearth_providers::{InferenceBackend, OpenAiCompatBackend};
use hearth_sessions::{ConversationStore, TranscriptStore};

use crate::backend::{BackendController, Systemctl, SystemdController};
use crate::runtime::{BroadcastSink, EventSink, Hearth};
use crate::state::AppState;

/// Broadcast buffer per SSE subscriber before it starts lagging.
const SSE_BUFFER: usize = 1024;

/// Log config issues and fail on errors.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// The collaborators the runtime is wired from.
pub struct Services {
    pub backend: Arc<dyn InferenceBackend>,
    pub controller: Arc<dyn BackendController>,
    pub store: Arc<dyn ConversationStore>,
}

/// Build the production collaborators: the OpenAI-compatible backend, the
/// systemd controller and the JSONL transcript.
pub fn build_services(config: &Config) -> anyhow::Result<Services> {
    let backend: Arc<dyn InferenceBackend> = Arc::new(
        OpenAiCompatBackend::from_config(&config.backend).context("initializing backend client")?,
    );
    tracing::info!(base_url = %config.backend.base_url, model = %config.backend.model, "backend client ready");

    let runner = Arc::new(Systemctl::new(Duration::from_millis(
        config.backend.systemd.command_timeout_ms,
    )));
    let controller: Arc<dyn BackendController> = Arc::new(
        SystemdController::new(&config.backend, runner, backend.clone())
            .context("initializing systemd controller")?,
    );
    tracing::info!(unit = %config.backend.systemd.unit, "systemd controller ready");

    let store: Arc<dyn ConversationStore> = Arc::new(TranscriptStore::new(config.store.path.clone()));
    tracing::info!(path = %config.store.path.display(), "conversation store ready");

    Ok(Services {
        backend,
        controller,
        store,
    })
}

/// Validate config, wire every subsystem and return a ready [`AppState`]
/// plus the delivery consumer handle.
pub async fn build_app_state(
    config: Arc<Config>,
    services: Services,
) -> anyhow::Result<(AppState, JoinHandle<u64>)> {
    check_config(&config)?;

    let events = BroadcastSink::new(SSE_BUFFER);
    let sink: Arc<dyn EventSink> = Arc::new(events.clone());
    let (hearth, consumer) = Hearth::build(
        &config,
        services.backend.clone(),
        services.controller.clone(),
        services.store,
        sink,
    );

    if config.reconfig.sync_on_startup {
        let desired = ReconfigRequest::new(
            config.reconfig.augmentation_enabled,
            config.reconfig.mode,
        );
        if let Some(outcome) = hearth.coordinator().sync_on_startup(desired).await {
            tracing::info!(?outcome, "startup backend sync finished");
        }
    }

    let state = AppState {
        config,
        hearth,
        backend: services.backend,
        controller: services.controller,
        events,
        started_at: Instant::now(),
    };
    Ok((state, consumer))
}
