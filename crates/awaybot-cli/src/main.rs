//! Awaybot CLI — entry point.
//!
//! # Commands
//!
//! - `awaybot run [--now]` — poll the mailbox and auto-reply until Ctrl+C
//! - `awaybot once` — run a single scan-and-reply cycle
//! - `awaybot authorize [--force]` — obtain and save credentials
//! - `awaybot labels` — list mailbox labels
//! - `awaybot status` — show configuration and credential files

mod commands;
mod helpers;
mod run;
mod session;
mod status;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 📭 Awaybot — answers unread mail while you are away
#[derive(Parser)]
#[command(name = "awaybot", version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.awaybot/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    logs: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll for unread conversations and reply until interrupted
    Run {
        /// Run the first cycle immediately instead of after one period
        #[arg(long, default_value_t = false)]
        now: bool,
    },

    /// Run one scan-and-reply cycle and print the report
    Once,

    /// Authorize mailbox access and save the credentials
    Authorize {
        /// Discard saved credentials and authorize again
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// List mailbox labels
    Labels,

    /// Show configuration and credential files
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run { now } => {
            init_logging(cli.logs, cli.json_logs, "info");
            run::run(config_path, now).await
        }
        Commands::Once => {
            init_logging(cli.logs, cli.json_logs, "warn");
            commands::once(config_path).await
        }
        Commands::Authorize { force } => {
            init_logging(cli.logs, cli.json_logs, "warn");
            commands::authorize(config_path, force).await
        }
        Commands::Labels => {
            init_logging(cli.logs, cli.json_logs, "warn");
            commands::labels(config_path).await
        }
        Commands::Status => status::run(config_path),
    }
}

/// Initialize tracing/logging.
///
/// `RUST_LOG` wins over the flags when set.
fn init_logging(verbose: bool, json: bool, quiet_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("awaybot=debug,info")
        } else {
            EnvFilter::new(quiet_level)
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
