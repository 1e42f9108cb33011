//! The interface plugin code implements.

use std::collections::BTreeMap;
use std::sync::Arc;

use caduceus_core::{BoundEvent, PluginName, ProtocolId};
use caduceus_sandbox::ImportRequest;
use serde_json::Value;

use crate::error::ProtocolResult;

/// Secret values configured for a plugin, keyed by declared name.
pub type Secrets = BTreeMap<String, String>;

/// One protocol instance, bound to a single event.
///
/// Instances are created fresh for every event and dropped after
/// [`compute`](Protocol::compute) returns. They are created and used on the
/// same blocking thread, so no `Send` bound is required.
pub trait Protocol {
    /// Produce candidate effects for the bound event.
    ///
    /// Each value is validated independently; an invalid one is dropped
    /// without affecting its siblings.
    ///
    /// # Errors
    ///
    /// Any error discards every effect of this invocation.
    fn compute(&mut self) -> ProtocolResult<Vec<Value>>;
}

/// Builds [`Protocol`] instances for a compiled-in protocol.
pub trait ProtocolFactory: Send + Sync {
    /// Modules (and names) the protocol's code imports. Checked against the
    /// allow-list before every instantiation.
    fn imports(&self) -> Vec<ImportRequest> {
        Vec::new()
    }

    /// Build an instance bound to `event`.
    ///
    /// # Errors
    ///
    /// An error here is reported as a construction failure.
    fn instantiate(
        &self,
        event: BoundEvent,
        ctx: ProtocolContext,
    ) -> ProtocolResult<Box<dyn Protocol>>;
}

/// Identity and configuration handed to a protocol instance.
#[derive(Debug, Clone)]
pub struct ProtocolContext {
    /// Owning plugin.
    pub plugin: PluginName,
    /// This protocol.
    pub protocol: ProtocolId,
    secrets: Arc<Secrets>,
}

impl ProtocolContext {
    /// Create a context.
    #[must_use]
    pub fn new(protocol: ProtocolId, secrets: Arc<Secrets>) -> Self {
        Self {
            plugin: protocol.plugin().clone(),
            protocol,
            secrets,
        }
    }

    /// A configured secret declared by the plugin.
    #[must_use]
    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }
}
