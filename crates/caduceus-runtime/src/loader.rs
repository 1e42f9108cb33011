//! Plugin loader.
//!
//! Turns a [`ProtocolDescriptor`] into a fresh [`Protocol`] instance for one
//! event. Nothing is reused across events: every call binds the event anew
//! and builds a new instance.

use std::sync::Arc;
use std::time::Duration;

use caduceus_core::Event;
use caduceus_sandbox::{GuardContext, ImportGuard};
use tracing::debug;

use crate::descriptor::{ProtocolDescriptor, ProtocolSource};
use crate::engine::WasmEngine;
use crate::error::HandlerError;
use crate::protocol::Protocol;

/// Resource limits applied to one instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceLimits {
    /// Wall-clock limit, enforced inside WASM instances as well.
    pub timeout: Option<Duration>,
}

impl InstanceLimits {
    /// Limits with the given timeout.
    #[must_use]
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

/// Import-checks and instantiates protocols.
#[derive(Debug, Clone)]
pub struct PluginLoader {
    guard: Arc<ImportGuard>,
    wasm: Arc<WasmEngine>,
}

impl PluginLoader {
    /// Create a loader that checks imports with `guard`.
    #[must_use]
    pub fn new(guard: Arc<ImportGuard>) -> Self {
        Self {
            guard,
            wasm: Arc::new(WasmEngine::default()),
        }
    }

    /// Use a configured WASM engine.
    #[must_use]
    pub fn with_wasm_engine(mut self, engine: WasmEngine) -> Self {
        self.wasm = Arc::new(engine);
        self
    }

    /// The import guard.
    #[must_use]
    pub fn guard(&self) -> &ImportGuard {
        &self.guard
    }

    /// The WASM engine.
    #[must_use]
    pub fn wasm_engine(&self) -> &WasmEngine {
        &self.wasm
    }

    /// Build a fresh instance of `descriptor` bound to `event`.
    ///
    /// # Errors
    ///
    /// - [`HandlerError::ImportDenied`] if an import is not allowed
    /// - [`HandlerError::Load`] if a WASM module cannot be loaded
    /// - [`HandlerError::Construction`] if the event does not bind or the
    ///   factory fails
    pub fn load(
        &self,
        descriptor: &ProtocolDescriptor,
        event: &Event,
        limits: &InstanceLimits,
    ) -> Result<Box<dyn Protocol>, HandlerError> {
        debug!(protocol = %descriptor.id, "Loading protocol instance");
        match &descriptor.source {
            ProtocolSource::Native(factory) => {
                let ctx =
                    GuardContext::new(descriptor.plugin(), &descriptor.id).with_own_package();
                self.guard.check_all(&factory.imports(), &ctx)?;

                let bound = event
                    .bind()
                    .map_err(|e| HandlerError::Construction(e.to_string()))?;
                factory
                    .instantiate(bound, descriptor.context())
                    .map_err(|e| HandlerError::Construction(e.to_string()))
            },
            ProtocolSource::Wasm(source) => {
                self.wasm
                    .instantiate(descriptor, source, &self.guard, event, limits)
            },
        }
    }
}
