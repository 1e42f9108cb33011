//! Caduceus Core - Foundation types shared by every part of the plugin runtime.
//!
//! This crate provides:
//! - The inbound [`Event`] and the [`BoundEvent`] a protocol instance sees
//! - The outbound [`Effect`] and its closed [`EffectType`] vocabulary
//! - Validated identifiers for plugins and protocols
//! - The [`Diagnostic`] record and the [`DiagnosticSink`] seam
//!
//! # Example
//!
//! ```rust
//! use caduceus_core::prelude::*;
//!
//! # fn main() -> Result<(), caduceus_core::CoreError> {
//! let event = Event::new(EventType::new("TASK_CREATED")?)
//!     .with_context(&serde_json::json!({ "task": { "priority": "urgent" } }));
//!
//! let bound = event.bind()?;
//! assert_eq!(bound.context["task"]["priority"], "urgent");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod diagnostic;
pub mod effect;
pub mod error;
pub mod event;
pub mod id;

pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink, NullSink};
pub use effect::{Effect, EffectType};
pub use error::{CoreError, CoreResult};
pub use event::{BoundEvent, Event, EventTarget, EventType};
pub use id::{PluginName, ProtocolId};
