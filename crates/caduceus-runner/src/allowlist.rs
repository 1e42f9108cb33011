//! `allowlist` subcommand.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use caduceus_sandbox::AllowList;

/// Write the host default allow-list to `out`, or stdout.
pub(crate) fn run(out: Option<&Path>) -> Result<()> {
    let text = AllowList::host_default()
        .to_json_pretty()
        .context("failed to serialize allow-list")?;

    match out {
        Some(path) => {
            std::fs::write(path, format!("{text}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote allow-list to {}", path.display());
        },
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}")?;
        },
    }
    Ok(())
}
