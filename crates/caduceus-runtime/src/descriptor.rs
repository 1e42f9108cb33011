//! Registered protocol metadata.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use caduceus_core::{EventType, PluginName, ProtocolId};

use crate::engine::wasm::ModuleSlot;
use crate::protocol::{ProtocolContext, ProtocolFactory, Secrets};

/// Where a protocol's code comes from.
#[derive(Clone)]
pub enum ProtocolSource {
    /// A compiled-in factory.
    Native(Arc<dyn ProtocolFactory>),
    /// A WASM module on disk.
    Wasm(WasmSource),
}

impl fmt::Debug for ProtocolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(_) => f.write_str("Native(..)"),
            Self::Wasm(src) => f.debug_tuple("Wasm").field(src).finish(),
        }
    }
}

/// A WASM protocol module and the export that computes effects.
///
/// The module is read on first load and kept here, shared by clones.
#[derive(Debug, Clone)]
pub struct WasmSource {
    /// Path to the `.wasm` file.
    pub module: PathBuf,
    /// Exported function called once per event.
    pub entrypoint: String,
    pub(crate) slot: ModuleSlot,
}

/// Everything the runtime knows about one registered protocol.
#[derive(Debug, Clone)]
pub struct ProtocolDescriptor {
    /// Globally unique id, `plugin:protocol`.
    pub id: ProtocolId,
    /// Event types this protocol subscribes to.
    pub responds_to: Vec<EventType>,
    /// Code source.
    pub source: ProtocolSource,
    /// Secrets the plugin declared and the config provided.
    pub secrets: Arc<Secrets>,
}

impl ProtocolDescriptor {
    /// Describe a compiled-in protocol.
    pub fn native(
        id: ProtocolId,
        responds_to: impl IntoIterator<Item = EventType>,
        factory: Arc<dyn ProtocolFactory>,
    ) -> Self {
        Self {
            id,
            responds_to: responds_to.into_iter().collect(),
            source: ProtocolSource::Native(factory),
            secrets: Arc::default(),
        }
    }

    /// Describe a WASM protocol.
    pub fn wasm(
        id: ProtocolId,
        responds_to: impl IntoIterator<Item = EventType>,
        module: impl Into<PathBuf>,
        entrypoint: impl Into<String>,
    ) -> Self {
        Self {
            id,
            responds_to: responds_to.into_iter().collect(),
            source: ProtocolSource::Wasm(WasmSource {
                module: module.into(),
                entrypoint: entrypoint.into(),
                slot: ModuleSlot::default(),
            }),
            secrets: Arc::default(),
        }
    }

    /// Attach secrets.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = Arc::new(secrets);
        self
    }

    /// The owning plugin.
    #[must_use]
    pub fn plugin(&self) -> &PluginName {
        self.id.plugin()
    }

    /// Context handed to instances of this protocol.
    #[must_use]
    pub fn context(&self) -> ProtocolContext {
        ProtocolContext::new(self.id.clone(), Arc::clone(&self.secrets))
    }
}
