//! `serve` subcommand: JSON lines in, effect arrays out.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use caduceus_config::Config;
use caduceus_core::Event;
use caduceus_runtime::{Dispatcher, Runtime, StartupError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use crate::config_bridge::to_log_config;

/// Exit code when the runtime cannot start.
const STARTUP_FAILURE: u8 = 2;

/// Counts from one pass over the input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ServeStats {
    /// Event lines dispatched.
    pub(crate) events: usize,
    /// Malformed lines skipped.
    pub(crate) skipped: usize,
}

/// Load config, start the runtime and serve `input` until it ends.
pub(crate) async fn run(config_file: Option<&Path>, input: &str, verbose: bool) -> Result<ExitCode> {
    let config = match Config::load(config_file) {
        Ok(resolved) => resolved.config,
        Err(e) => return Ok(startup_failed(&StartupError::from(e))),
    };

    let mut log_config = match to_log_config(&config) {
        Ok(log_config) => log_config,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(STARTUP_FAILURE));
        },
    };
    if verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = caduceus_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let runtime = match Runtime::start(&config) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Runtime failed to start");
            return Ok(startup_failed(&e));
        },
    };

    let stdout = tokio::io::stdout();
    let stats = if input == "-" {
        serve_lines(runtime.dispatcher(), BufReader::new(tokio::io::stdin()), stdout).await?
    } else {
        let file = tokio::fs::File::open(input)
            .await
            .with_context(|| format!("failed to open {input}"))?;
        serve_lines(runtime.dispatcher(), BufReader::new(file), stdout).await?
    };

    info!(
        events = stats.events,
        skipped = stats.skipped,
        "Input exhausted, shutting down"
    );
    Ok(ExitCode::SUCCESS)
}

fn startup_failed(e: &StartupError) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::from(STARTUP_FAILURE)
}

/// Dispatch every event line from `reader`, writing one effect array per
/// event to `writer`.
///
/// Blank lines are ignored. Lines that are not a valid event are reported on
/// stderr and skipped, and produce no output line.
pub(crate) async fn serve_lines<R, W>(
    dispatcher: &Dispatcher,
    reader: R,
    mut writer: W,
) -> Result<ServeStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = ServeStats::default();
    let mut lines = reader.lines();
    let mut line_no: usize = 0;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        line_no = line_no.saturating_add(1);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: Event = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed event");
                eprintln!("line {line_no}: malformed event: {e}");
                stats.skipped = stats.skipped.saturating_add(1);
                continue;
            },
        };

        let effects = dispatcher.dispatch(event).await;
        let mut out = serde_json::to_vec(&effects).context("failed to serialize effects")?;
        out.push(b'\n');
        writer.write_all(&out).await.context("failed to write effects")?;
        writer.flush().await.context("failed to flush output")?;
        stats.events = stats.events.saturating_add(1);
    }

    Ok(stats)
}
