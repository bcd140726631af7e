//! ChainFeed CLI: run recorded ledger events through session filters.
//!
//! # Commands
//! ```text
//! chainfeed replay   --events <events.jsonl> --request <request.json> [--config <engine.yaml>]
//! chainfeed validate --request <request.json> [--config <engine.yaml>]
//! chainfeed info
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

mod cmd_replay;
mod cmd_validate;

#[derive(Parser)]
#[command(
    name = "chainfeed",
    about = "Commitment-gated ledger event filtering: ChainFeed CLI",
    long_about = "
ChainFeed CLI: replay recorded raw ledger events (one JSON object per line)
through the commitment gate and a session's filters, printing every update
the session would receive.

Config and request files are read as YAML when they end in .yaml / .yml,
JSON otherwise. Logs go to stderr; updates go to stdout.
",
    version
)]
struct Cli {
    /// Log level: trace | debug | info | warn | error
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded event file through one session
    Replay {
        /// JSON-lines file of raw ledger events
        #[arg(long)]
        events: PathBuf,
        /// Subscribe request (filters, commitment, data slices)
        #[arg(long)]
        request: PathBuf,
        /// Engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print one summary line per update instead of full JSON
        #[arg(long)]
        summary: bool,
        /// Print engine counters to stderr when done
        #[arg(long)]
        stats: bool,
    },

    /// Validate a subscribe request against the configured filter limits
    Validate {
        #[arg(long)]
        request: PathBuf,
        /// Engine configuration (for `limits`)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show ChainFeed build info and the default engine configuration
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = chainfeed_observability::LogConfig {
        level: cli.log_level.clone(),
        json: cli.json_logs,
        ..Default::default()
    };
    chainfeed_observability::init_tracing(&log_config).context("failed to initialise logging")?;

    match cli.command {
        Commands::Replay {
            events,
            request,
            config,
            summary,
            stats,
        } => cmd_replay::run(&events, &request, config.as_deref(), summary, stats).await,

        Commands::Validate { request, config } => cmd_validate::run(&request, config.as_deref()),

        Commands::Info => cmd_info(),
    }
}

/// Read a YAML or JSON document, chosen by file extension.
pub(crate) fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let is_yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("invalid YAML in '{}'", path.display()))
    } else {
        serde_json::from_str(&content).with_context(|| format!("invalid JSON in '{}'", path.display()))
    }
}

pub(crate) fn load_config(path: Option<&Path>) -> Result<chainfeed_engine::EngineConfig> {
    match path {
        Some(path) => load(path),
        None => Ok(chainfeed_engine::EngineConfig::default()),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_info() -> Result<()> {
    println!("ChainFeed v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Capabilities:");
    println!("  ✓ Account filters          (pubkey, owner, memcmp, datasize, lamports, token account)");
    println!("  ✓ Transaction filters      (vote, failed, signature, include / exclude / required)");
    println!("  ✓ Slot, block, block-meta and entry filters");
    println!("  ✓ Commitment gate          (processed / confirmed / finalized bands)");
    println!("  ✓ Account data slices");
    println!("  ✓ Bounded session queues   (overflow closes the session)");
    println!("  ✓ Parallel matching        (Rayon)");
    println!();
    println!("Default engine configuration:");
    print!("{}", serde_yaml::to_string(&chainfeed_engine::EngineConfig::default())?);
    Ok(())
}
