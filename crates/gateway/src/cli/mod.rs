pub mod ask;
pub mod config;

use clap::{Parser, Subcommand};

/// hearthd: local assistant daemon with streamed generations and live
/// backend reconfiguration.
#[derive(Debug, Parser)]
#[command(name = "hearthd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP daemon (default when no subcommand is given).
    Serve,
    /// Send one message and stream the answer to stdout.
    Ask {
        /// The message to send.
        message: String,
        /// Print the outcome as JSON instead of streaming text.
        #[arg(long)]
        json: bool,
        /// Do not include stored conversation history as context.
        #[arg(long)]
        no_context: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `HEARTH_CONFIG` (or `config.toml`). A
/// missing file yields the defaults.
pub fn load_config() -> anyhow::Result<(hearth_domain::config::Config, String)> {
    let config_path = std::env::var("HEARTH_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<hearth_domain::config::Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(hearth_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}
