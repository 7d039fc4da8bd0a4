//! # inventory-capture
//!
//! Operator binary for the offline asset-capture queue.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Command Startup                                  │
//! │                                                                         │
//! │  1. Initialize Logging ──► tracing-subscriber, RUST_LOG overrides       │
//! │  2. Load Config ─────────► capture.toml + INVENTORY_* env vars          │
//! │  3. Open Database ───────► SQLite file, run migrations                  │
//! │  4. Self-Repair ─────────► drop duplicate captures left in the queue    │
//! │  5. Run Command ─────────► submit / pending / sync / watch / ...        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `config` commands skip steps 3 and 4.

mod app;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{config, counters, pending, submit, sync};
use output::OutputFormat;

/// Offline asset capture: queue, review and sync
#[derive(Parser)]
#[command(name = "inventory-capture")]
#[command(author, version, about = "Offline asset capture queue and sync", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "INVENTORY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a capture: send it now if the service answers, otherwise queue it
    Submit(submit::SubmitArgs),

    /// Review and maintain the pending queue
    #[command(subcommand)]
    Pending(PendingCommands),

    /// Run one sync pass now
    Sync,

    /// Keep running and sync on reconnect and on a timer
    Watch,

    /// Registration id counters
    #[command(subcommand)]
    Counters(CounterCommands),

    /// Show connectivity and queue status
    Status,

    /// Configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum PendingCommands {
    /// List pending captures in the order they will be sent
    List,

    /// Number of pending captures
    Count,

    /// Remove duplicate captures, keeping the earliest of each
    Repair,

    /// Discard every pending capture
    Purge {
        /// Confirm that unsent captures will be lost
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum CounterCommands {
    /// Show the last registration number issued per submitter
    Show,

    /// Forget all counters; numbering restarts at 1
    Reset {
        /// Confirm that registration ids may be issued again
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a config file with defaults and a new device id
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let format = cli.format;

    if let Commands::Config(cmd) = &cli.command {
        return match cmd {
            ConfigCommands::Show => config::show(cli.config.clone(), format),
            ConfigCommands::Init { force } => config::init(cli.config.clone(), *force),
        };
    }

    let app = app::App::open(cli.config.clone()).await?;

    let result = match cli.command {
        Commands::Submit(args) => submit::run(&app, args, format).await,
        Commands::Pending(cmd) => match cmd {
            PendingCommands::List => pending::list(&app, format).await,
            PendingCommands::Count => pending::count(&app, format).await,
            PendingCommands::Repair => pending::repair(&app).await,
            PendingCommands::Purge { yes } => pending::purge(&app, yes).await,
        },
        Commands::Sync => sync::sync_once(&app, format).await,
        Commands::Watch => sync::watch(&app).await,
        Commands::Counters(cmd) => match cmd {
            CounterCommands::Show => counters::show(&app, format).await,
            CounterCommands::Reset { yes } => counters::reset(&app, yes).await,
        },
        Commands::Status => sync::status(&app, format).await,
        Commands::Config(_) => Ok(()),
    };

    app.close().await;
    result
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=inventory_sync=trace` - Trace the sync engine only
/// - Default: INFO, DEBUG for the inventory crates
///
/// Logs go to stderr so command output stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,inventory=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_purge_requires_flag_to_confirm() {
        let cli = Cli::try_parse_from(["inventory-capture", "pending", "purge"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Pending(PendingCommands::Purge { yes: false })
        ));

        let cli = Cli::try_parse_from(["inventory-capture", "pending", "purge", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Pending(PendingCommands::Purge { yes: true })
        ));
    }

    #[test]
    fn test_global_format_flag() {
        let cli = Cli::try_parse_from(["inventory-capture", "status", "--format", "json"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
