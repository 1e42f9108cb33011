//! Structured diagnostics for handler-level failures.
//!
//! The dispatcher never surfaces a handler failure to its caller. Instead it
//! records a [`Diagnostic`] and hands it to a [`DiagnosticSink`]. The default
//! sink (in `caduceus-telemetry`) forwards to `tracing`; tests collect them in
//! memory.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::EventType;
use crate::id::{PluginName, ProtocolId};

/// Category of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The guard refused a module or name the protocol imports.
    ImportDenied,
    /// The protocol's code could not be found, parsed or instantiated.
    LoadError,
    /// The protocol could not be constructed for this event.
    ConstructionError,
    /// The protocol failed while computing effects.
    HandlerExecutionError,
    /// The protocol exceeded its time limit.
    HandlerTimeout,
    /// The protocol panicked.
    HandlerPanicked,
    /// A returned effect was malformed and dropped.
    EffectShapeError,
}

impl DiagnosticKind {
    /// Stable snake-case name, used as a log field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImportDenied => "import_denied",
            Self::LoadError => "load_error",
            Self::ConstructionError => "construction_error",
            Self::HandlerExecutionError => "handler_execution_error",
            Self::HandlerTimeout => "handler_timeout",
            Self::HandlerPanicked => "handler_panicked",
            Self::EffectShapeError => "effect_shape_error",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded failure, attributed to a plugin and protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Plugin the failure is attributed to.
    pub plugin: PluginName,
    /// Protocol the failure is attributed to.
    pub protocol: ProtocolId,
    /// Event being dispatched when the failure happened.
    pub event_type: EventType,
    /// Failure category.
    pub kind: DiagnosticKind,
    /// Human-readable detail.
    pub message: String,
}

/// Receiver for diagnostics.
///
/// Sinks are called from the dispatching task and must not block for long.
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic.
    fn record(&self, diagnostic: &Diagnostic);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _diagnostic: &Diagnostic) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&DiagnosticKind::HandlerExecutionError).unwrap();
        assert_eq!(json, "\"handler_execution_error\"");
        assert_eq!(
            DiagnosticKind::HandlerExecutionError.as_str(),
            "handler_execution_error"
        );
    }

    #[test]
    fn test_diagnostic_serializes_ids_as_strings() {
        let diag = Diagnostic {
            plugin: PluginName::new("banner").unwrap(),
            protocol: "banner:manager".parse().unwrap(),
            event_type: EventType::new("TASK_CREATED").unwrap(),
            kind: DiagnosticKind::ImportDenied,
            message: "os.system_exec".into(),
        };
        let value = serde_json::to_value(&diag).unwrap();
        assert_eq!(value["protocol"], "banner:manager");
        assert_eq!(value["kind"], "import_denied");
    }
}
