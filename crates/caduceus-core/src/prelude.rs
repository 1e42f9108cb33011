//! Prelude module - commonly used types for convenient import.
//!
//! Use `use caduceus_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CoreError, CoreResult};

// Events and effects
pub use crate::{BoundEvent, Effect, EffectType, Event, EventTarget, EventType};

// Identifiers
pub use crate::{PluginName, ProtocolId};

// Diagnostics
pub use crate::{Diagnostic, DiagnosticKind, DiagnosticSink, NullSink};
