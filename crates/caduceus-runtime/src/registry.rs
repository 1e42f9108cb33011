//! Protocol registry.
//!
//! Maps event types to the protocols that respond to them. A registry is
//! built once (at startup or reload) and then published to the dispatcher as
//! an immutable snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use caduceus_core::{EventType, PluginName, ProtocolId};
use tracing::{debug, info, warn};

use crate::descriptor::ProtocolDescriptor;
use crate::error::RegistryError;

/// Event type to handler routing table.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    by_event: HashMap<EventType, Vec<Arc<ProtocolDescriptor>>>,
    descriptors: Vec<Arc<ProtocolDescriptor>>,
}

impl ProtocolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol under every event type it responds to.
    ///
    /// Repeated event types in `responds_to` route the protocol once.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateProtocol`] if a protocol with the
    /// same id is already registered.
    pub fn register(&mut self, mut descriptor: ProtocolDescriptor) -> Result<(), RegistryError> {
        if self.contains(&descriptor.id) {
            return Err(RegistryError::DuplicateProtocol(descriptor.id));
        }

        let mut seen = Vec::with_capacity(descriptor.responds_to.len());
        descriptor.responds_to.retain(|t| {
            if seen.contains(t) {
                false
            } else {
                seen.push(t.clone());
                true
            }
        });

        if descriptor.responds_to.is_empty() {
            warn!(
                protocol = %descriptor.id,
                "Protocol responds to no event types; it will never run"
            );
        }

        let descriptor = Arc::new(descriptor);
        for event_type in &descriptor.responds_to {
            self.by_event
                .entry(event_type.clone())
                .or_default()
                .push(Arc::clone(&descriptor));
        }

        info!(
            protocol = %descriptor.id,
            event_types = descriptor.responds_to.len(),
            "Registered protocol"
        );
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Handlers for `event_type`, in registration order.
    #[must_use]
    pub fn resolve(&self, event_type: &EventType) -> &[Arc<ProtocolDescriptor>] {
        self.by_event
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Remove every protocol owned by `plugin`. Returns how many were removed.
    pub fn unregister_plugin(&mut self, plugin: &PluginName) -> usize {
        let before = self.descriptors.len();
        self.descriptors.retain(|d| d.plugin() != plugin);
        let removed = before.saturating_sub(self.descriptors.len());

        if removed > 0 {
            for handlers in self.by_event.values_mut() {
                handlers.retain(|d| d.plugin() != plugin);
            }
            self.by_event.retain(|_, handlers| !handlers.is_empty());
            debug!(plugin = %plugin, removed, "Unregistered plugin protocols");
        }
        removed
    }

    /// Whether a protocol with this id is registered.
    #[must_use]
    pub fn contains(&self, id: &ProtocolId) -> bool {
        self.descriptors.iter().any(|d| &d.id == id)
    }

    /// Look up a protocol by id.
    #[must_use]
    pub fn get(&self, id: &ProtocolId) -> Option<&Arc<ProtocolDescriptor>> {
        self.descriptors.iter().find(|d| &d.id == id)
    }

    /// All registered protocols, in registration order.
    #[must_use]
    pub fn descriptors(&self) -> &[Arc<ProtocolDescriptor>] {
        &self.descriptors
    }

    /// Event types with at least one handler, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&EventType> {
        let mut types: Vec<_> = self.by_event.keys().collect();
        types.sort();
        types
    }

    /// Number of registered protocols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the registry has no protocols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ProtocolSource;

    fn et(s: &str) -> EventType {
        EventType::new(s).unwrap()
    }

    fn descriptor(plugin: &str, name: &str, types: &[&str]) -> ProtocolDescriptor {
        let id = ProtocolId::new(PluginName::new(plugin).unwrap(), name).unwrap();
        ProtocolDescriptor::wasm(
            id,
            types.iter().map(|t| et(t)),
            format!("{name}.wasm"),
            "compute",
        )
    }

    fn ids(handlers: &[Arc<ProtocolDescriptor>]) -> Vec<String> {
        handlers.iter().map(|d| d.id.to_string()).collect()
    }

    #[test]
    fn test_resolve_preserves_registration_order() {
        let mut registry = ProtocolRegistry::new();
        registry.register(descriptor("b", "second", &["X"])).unwrap();
        registry.register(descriptor("a", "first", &["X", "Y"])).unwrap();

        assert_eq!(ids(registry.resolve(&et("X"))), ["b:second", "a:first"]);
        assert_eq!(ids(registry.resolve(&et("Y"))), ["a:first"]);
    }

    #[test]
    fn test_unknown_event_type_resolves_empty() {
        let registry = ProtocolRegistry::new();
        assert!(registry.resolve(&et("NOTHING")).is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = ProtocolRegistry::new();
        registry.register(descriptor("a", "p", &["X"])).unwrap();
        let err = registry.register(descriptor("a", "p", &["Y"])).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateProtocol(id) if id.to_string() == "a:p"));
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(&et("Y")).is_empty());
    }

    #[test]
    fn test_repeated_event_type_routes_once() {
        let mut registry = ProtocolRegistry::new();
        registry.register(descriptor("a", "p", &["X", "X"])).unwrap();
        assert_eq!(registry.resolve(&et("X")).len(), 1);
    }

    #[test]
    fn test_empty_responds_to_registers_but_routes_nothing() {
        let mut registry = ProtocolRegistry::new();
        registry.register(descriptor("a", "idle", &[])).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.event_types().is_empty());
    }

    #[test]
    fn test_unregister_plugin() {
        let mut registry = ProtocolRegistry::new();
        registry.register(descriptor("a", "one", &["X"])).unwrap();
        registry.register(descriptor("a", "two", &["Y"])).unwrap();
        registry.register(descriptor("b", "three", &["X"])).unwrap();

        assert_eq!(registry.unregister_plugin(&PluginName::new("a").unwrap()), 2);
        assert_eq!(ids(registry.resolve(&et("X"))), ["b:three"]);
        assert_eq!(registry.event_types(), [&et("X")]);
        assert_eq!(registry.unregister_plugin(&PluginName::new("a").unwrap()), 0);
    }

    #[test]
    fn test_get_and_source() {
        let mut registry = ProtocolRegistry::new();
        registry.register(descriptor("a", "p", &["X"])).unwrap();
        let id = ProtocolId::new(PluginName::new("a").unwrap(), "p").unwrap();
        let found = registry.get(&id).unwrap();
        assert!(matches!(&found.source, ProtocolSource::Wasm(w) if w.entrypoint == "compute"));
    }
}
