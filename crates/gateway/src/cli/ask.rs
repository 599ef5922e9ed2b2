//! `hearthd ask`: one-shot generation.
//!
//! Streams the answer to stdout and reasoning (dimmed) to stderr, then
//! exits. The backend is not reconfigured on this path.

use std::io::Write;
use std::sync::Arc;

use hearth_domain::config::Config;
use hearth_domain::generation::{Envelope, GenerationStatus, Notification};

use crate::bootstrap::{self, Services};
use crate::runtime::{EventSink, Hearth};

/// Writes delivered notifications straight to the terminal.
struct ConsoleSink {
    quiet: bool,
}

#[async_trait::async_trait]
impl EventSink for ConsoleSink {
    async fn deliver(&self, envelope: Envelope) {
        if self.quiet {
            return;
        }
        match envelope.notification {
            Notification::Content { text, .. } => {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
            Notification::Reasoning { text, .. } => {
                eprint!("\x1b[2m{text}\x1b[0m");
                std::io::stderr().flush().ok();
            }
            Notification::Complete { .. } => println!(),
            Notification::BackendReconfigured { .. }
            | Notification::BackendReconfigureFailed { .. } => {}
        }
    }
}

/// Run one generation and print it. Returns the process exit code.
pub async fn run(
    config: Arc<Config>,
    message: String,
    json_output: bool,
    no_context: bool,
) -> anyhow::Result<i32> {
    bootstrap::check_config(&config)?;
    let services = bootstrap::build_services(&config)?;

    let mut config = (*config).clone();
    if no_context {
        config.generation.context_limit = 0;
    }
    let sink = Arc::new(ConsoleSink { quiet: json_output });
    let (hearth, consumer) = Hearth::build(
        &config,
        services.backend,
        services.controller,
        services.store,
        sink,
    );

    let ticket = hearth.start_generation(message).await;
    let outcome = ticket.handle.await?;

    // Let the consumer flush the tail of the answer.
    drop(hearth);
    consumer.await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let Some(error) = &outcome.error {
        eprintln!("error: {error}");
    }

    Ok(match outcome.status {
        GenerationStatus::Completed => 0,
        _ => 1,
    })
}
