//! Curtain CLI entry point.
//!
//! This binary is the composition root for the native hosts. Responsibilities:
//!
//! 1. **Parse configuration**: load `curtain.toml` (or `--config`) and
//!    validate it before anything else runs.
//! 2. **Wire observability**: configure `tracing-subscriber` with a text or
//!    JSON layer and, when an endpoint is configured, an OpenTelemetry OTLP
//!    exporter. All `tracing` spans and events emitted by every crate in the
//!    workspace flow through this subscriber.
//! 3. **Construct infrastructure**: open the `FileStore` and inject it, an
//!    in-memory document and a `TimerQueue` into the `Sequencer`.
//! 4. **Dispatch the command**: `simulate` replays a page load on the
//!    virtual clock, `run` drives one in real time with stdin clicks,
//!    `status` and `reset` inspect or clear the visit flag.

mod commands;
mod config;
mod observability;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::commands::{Command, Resolved};
use crate::config::{CurtainConfig, DEFAULT_CONFIG_FILE};

#[derive(Debug, Parser)]
#[command(name = "curtain", version, about = "First-visit reveal overlay sequencer", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, env = "CURTAIN_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Visit-flag store file; overrides `[storage] path`.
    #[arg(long, global = true, env = "CURTAIN_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = CurtainConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let telemetry = observability::init(&config.logging, &config.telemetry)?;

    let resolved = Resolved {
        settings: config.settings()?,
        store_path: cli.store.unwrap_or_else(|| config.storage.path.clone()),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = match &cli.command {
        Command::Simulate(args) => commands::simulate(&resolved, args, &mut out),
        Command::Run(args) => commands::run(&resolved, args, &mut out).await,
        Command::Status => commands::status(&resolved, &mut out),
        Command::Reset => commands::reset(&resolved, &mut out),
    };

    telemetry.shutdown();
    result
}
