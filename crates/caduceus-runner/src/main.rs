//! `caduceus-runner` - host process for the Caduceus plugin runtime.
//!
//! `serve` reads newline-delimited JSON events and writes one JSON array of
//! effects per event. `allowlist` writes the host default import allow-list
//! that `serve` requires at startup.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod allowlist;
mod config_bridge;
mod serve;

/// Caduceus - clinical plugin runtime
#[derive(Parser)]
#[command(name = "caduceus-runner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the runtime and dispatch events read as JSON lines
    Serve {
        /// Path to configuration file
        #[arg(short, long, env = "CADUCEUS_CONFIG")]
        config: Option<PathBuf>,

        /// Event source, `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
    },

    /// Write the host default import allow-list
    Allowlist {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, input } => {
            serve::run(config.as_deref(), &input, cli.verbose).await
        },
        Commands::Allowlist { out } => {
            allowlist::run(out.as_deref())?;
            Ok(ExitCode::SUCCESS)
        },
    }
}
