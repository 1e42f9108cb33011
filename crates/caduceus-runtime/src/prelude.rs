//! Prelude module - commonly used types for convenient import.
//!
//! Use `use caduceus_runtime::prelude::*;` to import all essential types.

// Errors
pub use crate::{
    EffectShapeError, HandlerError, ProtocolError, ProtocolResult, RegistryError, StartupError,
};

// Plugin-facing traits
pub use crate::{Protocol, ProtocolContext, ProtocolFactory, Secrets};

// Registration and dispatch
pub use crate::{
    DispatchReport, Dispatcher, HandlerRecord, ProtocolDescriptor, ProtocolRegistry, ProtocolSource,
    Runtime, RuntimeBuilder, WasmSource,
};

// Policies
pub use crate::{EffectValidator, FixedTimeout, NoTimeout, PluginTimeouts, TimeoutPolicy};
