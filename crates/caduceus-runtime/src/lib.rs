//! Caduceus Runtime - Event dispatch to sandboxed plugin protocols.
//!
//! This crate provides:
//! - The [`Protocol`] and [`ProtocolFactory`] traits plugin code implements
//! - The [`ProtocolRegistry`], mapping event types to subscribed protocols
//! - The [`PluginLoader`], which import-guards and instantiates protocols
//!   (native factories or WASM modules via Extism)
//! - The [`Dispatcher`], which runs every subscribed protocol in isolation
//!   and aggregates the effects that pass the [`EffectValidator`]
//! - [`Runtime`], which wires all of the above from a [`caduceus_config::Config`]
//!
//! # Example
//!
//! ```rust,no_run
//! use caduceus_config::Config;
//! use caduceus_core::{Event, EventType};
//! use caduceus_runtime::Runtime;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let resolved = Config::load(None)?;
//! let runtime = Runtime::start(&resolved.config)?;
//!
//! let event = Event::new(EventType::new("TASK_CREATED")?)
//!     .with_raw_context(r#"{"task": {"id": "t-1"}}"#);
//! let effects = runtime.dispatcher().dispatch(event).await;
//! println!("{}", serde_json::to_string(&effects)?);
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

pub mod bootstrap;
pub mod descriptor;
pub mod discovery;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod outcome;
pub mod protocol;
pub mod registry;
pub mod timeout;
pub mod validator;

pub use bootstrap::{Runtime, RuntimeBuilder};
pub use descriptor::{ProtocolDescriptor, ProtocolSource, WasmSource};
pub use dispatcher::Dispatcher;
pub use engine::WasmEngine;
pub use error::{
    EffectShapeError, HandlerError, ProtocolError, ProtocolResult, RegistryError, RuntimeError,
    RuntimeResult, StartupError,
};
pub use loader::{InstanceLimits, PluginLoader};
pub use manifest::PluginManifest;
pub use outcome::{DispatchCancelled, DispatchReport, HandlerRecord};
pub use protocol::{Protocol, ProtocolContext, ProtocolFactory, Secrets};
pub use registry::ProtocolRegistry;
pub use timeout::{FixedTimeout, NoTimeout, PluginTimeouts, TimeoutPolicy};
pub use validator::EffectValidator;
