//! WASM protocols via Extism.
//!
//! A module is read and scanned on its protocol's first load and kept on
//! that protocol's descriptor. A reload builds new descriptors, so each
//! registry snapshot keeps the bytes it already read. Every event gets a
//! fresh Extism plugin built from the cached bytes, so no guest state
//! survives between events.
//!
//! Guest contract: the entrypoint export receives the bound event as JSON
//! input and sets its output to a JSON array of raw effects (an empty
//! output or `null` means no effects; a single object is one effect). A
//! non-zero return code or a trap is an execution error.

mod host;

use std::sync::{Arc, OnceLock};

use caduceus_core::Event;
use caduceus_core::event::json_kind;
use caduceus_sandbox::{GuardContext, ImportGuard, ModuleScan, scan_module};
use extism::{Manifest, PluginBuilder, UserData, Wasm};
use serde_json::Value;
use tracing::debug;

use crate::descriptor::{ProtocolDescriptor, WasmSource};
use crate::error::{HandlerError, ProtocolError, ProtocolResult};
use crate::loader::InstanceLimits;
use crate::protocol::Protocol;

use self::host::{HostState, register_host_functions};

/// Default memory cap: 256 pages (16 MiB).
pub const DEFAULT_MEMORY_MAX_PAGES: u32 = 256;

#[derive(Debug)]
pub(crate) struct CachedModule {
    bytes: Vec<u8>,
    scan: ModuleScan,
}

/// Holds a protocol's module once it has been read. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub(crate) struct ModuleSlot(Arc<OnceLock<Arc<CachedModule>>>);

impl ModuleSlot {
    fn get(&self) -> Option<Arc<CachedModule>> {
        self.0.get().map(Arc::clone)
    }

    /// Store `module` unless a concurrent first load got there first, and
    /// return whichever is stored.
    fn fill(&self, module: CachedModule) -> Arc<CachedModule> {
        Arc::clone(self.0.get_or_init(|| Arc::new(module)))
    }
}

/// Builds [`Protocol`] instances from WASM modules.
#[derive(Debug)]
pub struct WasmEngine {
    memory_max_pages: u32,
    wasi: bool,
}

impl Default for WasmEngine {
    fn default() -> Self {
        Self {
            memory_max_pages: DEFAULT_MEMORY_MAX_PAGES,
            wasi: false,
        }
    }
}

impl WasmEngine {
    /// Create an engine with default limits and WASI disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap instance memory, in 64 KiB pages.
    #[must_use]
    pub fn with_memory_max_pages(mut self, pages: u32) -> Self {
        self.memory_max_pages = pages;
        self
    }

    /// Give instances a WASI preview 1 environment.
    #[must_use]
    pub fn with_wasi(mut self, enabled: bool) -> Self {
        self.wasi = enabled;
        self
    }

    /// Build a fresh instance of `source` bound to `event`.
    ///
    /// Imports are checked against the guard before any guest code runs.
    ///
    /// # Errors
    ///
    /// - [`HandlerError::Load`] if the module is missing, invalid, lacks the
    ///   entrypoint, or fails to instantiate
    /// - [`HandlerError::ImportDenied`] if the guard refuses an import
    /// - [`HandlerError::Construction`] if the event does not bind
    pub fn instantiate(
        &self,
        descriptor: &ProtocolDescriptor,
        source: &WasmSource,
        guard: &ImportGuard,
        event: &Event,
        limits: &InstanceLimits,
    ) -> Result<Box<dyn Protocol>, HandlerError> {
        let module = Self::module(source)?;

        // WASM imports name host namespaces, so no own-package exemption.
        guard.check_all(
            &module.scan.imports,
            &GuardContext::new(descriptor.plugin(), &descriptor.id),
        )?;

        if !module.scan.exports_function(&source.entrypoint) {
            return Err(HandlerError::Load(format!(
                "{} does not export function '{}'",
                source.module.display(),
                source.entrypoint
            )));
        }

        let bound = event
            .bind()
            .map_err(|e| HandlerError::Construction(e.to_string()))?;
        let input =
            serde_json::to_vec(&bound).map_err(|e| HandlerError::Construction(e.to_string()))?;

        let mut manifest = Manifest::new([Wasm::data(module.bytes.clone())])
            .with_memory_max(self.memory_max_pages);
        if let Some(timeout) = limits.timeout {
            manifest = manifest.with_timeout(timeout);
        }

        let user_data = UserData::new(HostState {
            plugin: descriptor.plugin().clone(),
            protocol: descriptor.id.clone(),
            secrets: Arc::clone(&descriptor.secrets),
        });
        let builder = PluginBuilder::new(manifest).with_wasi(self.wasi);
        let plugin = register_host_functions(builder, &user_data)
            .build()
            .map_err(|e| HandlerError::Load(format!("failed to instantiate module: {e:#}")))?;

        Ok(Box::new(WasmProtocol {
            plugin,
            entrypoint: source.entrypoint.clone(),
            input,
        }))
    }

    fn module(source: &WasmSource) -> Result<Arc<CachedModule>, HandlerError> {
        if let Some(cached) = source.slot.get() {
            return Ok(cached);
        }

        let path = &source.module;
        let bytes = std::fs::read(path).map_err(|e| {
            HandlerError::Load(format!("failed to read WASM module {}: {e}", path.display()))
        })?;
        let scan = scan_module(&bytes).map_err(|e| {
            HandlerError::Load(format!("{}: {e}", path.display()))
        })?;
        debug!(
            path = %path.display(),
            imports = scan.imports.len(),
            "Cached WASM module"
        );
        Ok(source.slot.fill(CachedModule { bytes, scan }))
    }
}

/// One Extism plugin instance bound to one event.
struct WasmProtocol {
    plugin: extism::Plugin,
    entrypoint: String,
    input: Vec<u8>,
}

impl Protocol for WasmProtocol {
    fn compute(&mut self) -> ProtocolResult<Vec<Value>> {
        let output = self
            .plugin
            .call::<&[u8], Vec<u8>>(&self.entrypoint, &self.input)
            .map_err(|e| ProtocolError::failed(format!("{} failed: {e:#}", self.entrypoint)))?;
        parse_output(&output)
    }
}

/// Decode a guest's output into raw effect candidates.
fn parse_output(output: &[u8]) -> ProtocolResult<Vec<Value>> {
    if output.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_slice(output)
        .map_err(|e| ProtocolError::failed(format!("output is not valid JSON: {e}")))?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(effects) => Ok(effects),
        obj @ Value::Object(_) => Ok(vec![obj]),
        other => Err(ProtocolError::failed(format!(
            "output must be an array of effects, found {}",
            json_kind(&other)
        ))),
    }
}
