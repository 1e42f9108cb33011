//! Caduceus Telemetry - Logging and diagnostics for the plugin runtime.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - A per-dispatch correlation context
//! - [`TracingSink`], which forwards handler diagnostics to `tracing`
//!
//! # Example
//!
//! ```rust,no_run
//! use caduceus_telemetry::{LogConfig, LogFormat, setup_logging, DispatchContext};
//!
//! # fn main() -> Result<(), caduceus_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Json)
//!     .with_directive("caduceus_sandbox=trace");
//!
//! setup_logging(&config)?;
//!
//! let ctx = DispatchContext::new("TASK_CREATED");
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("dispatching");
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

mod context;
mod error;
mod logging;
mod sink;

pub use context::DispatchContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
pub use sink::TracingSink;
