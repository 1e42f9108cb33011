//! Diagnostic forwarding to `tracing`.

use caduceus_core::{Diagnostic, DiagnosticKind, DiagnosticSink};
use tracing::{error, warn};

/// Forwards handler diagnostics to `tracing` as structured events.
///
/// Panics and execution errors are logged at `error`; everything else at
/// `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, d: &Diagnostic) {
        match d.kind {
            DiagnosticKind::HandlerPanicked | DiagnosticKind::HandlerExecutionError => error!(
                plugin = %d.plugin,
                protocol = %d.protocol,
                event_type = %d.event_type,
                kind = d.kind.as_str(),
                error = %d.message,
                "Protocol handler failed"
            ),
            DiagnosticKind::EffectShapeError => warn!(
                plugin = %d.plugin,
                protocol = %d.protocol,
                event_type = %d.event_type,
                kind = d.kind.as_str(),
                error = %d.message,
                "Dropped invalid effect"
            ),
            _ => warn!(
                plugin = %d.plugin,
                protocol = %d.protocol,
                event_type = %d.event_type,
                kind = d.kind.as_str(),
                error = %d.message,
                "Protocol handler failed"
            ),
        }
    }
}
