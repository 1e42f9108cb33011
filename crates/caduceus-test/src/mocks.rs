//! Protocol fixtures and a recording diagnostic sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use caduceus_core::{BoundEvent, Diagnostic, DiagnosticKind, DiagnosticSink};
use caduceus_runtime::{
    Protocol, ProtocolContext, ProtocolDescriptor, ProtocolError, ProtocolFactory, ProtocolResult,
};
use caduceus_sandbox::ImportRequest;
use serde_json::Value;

use crate::fixtures::{test_event_type, test_protocol_id};

/// Records every diagnostic it receives.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.records.lock().map(|r| r.to_vec()).unwrap_or_default()
    }

    /// Diagnostics of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<Diagnostic> {
        self.diagnostics()
            .into_iter()
            .filter(|d| d.kind == kind)
            .collect()
    }

    /// Number of recorded diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, diagnostic: &Diagnostic) {
        if let Ok(mut records) = self.records.lock() {
            records.push(diagnostic.clone());
        }
    }
}

/// What a [`FixtureFactory`] instance does in `compute`.
#[derive(Debug, Clone)]
pub enum FixtureBehavior {
    /// Return these raw effects.
    Emit(Vec<Value>),
    /// Return an error with this message.
    Fail(String),
    /// Panic with this message.
    Panic(String),
    /// Sleep, then return these raw effects.
    Slow(Duration, Vec<Value>),
    /// Return the bound event as a `LOG` payload.
    Echo,
}

/// A native protocol factory with scripted behavior.
#[derive(Debug)]
pub struct FixtureFactory {
    behavior: FixtureBehavior,
    imports: Vec<ImportRequest>,
    instances: AtomicUsize,
}

impl FixtureFactory {
    /// Create a factory.
    #[must_use]
    pub fn new(behavior: FixtureBehavior) -> Self {
        Self {
            behavior,
            imports: Vec::new(),
            instances: AtomicUsize::new(0),
        }
    }

    /// Declare an import the protocol's code makes.
    #[must_use]
    pub fn with_import(mut self, request: ImportRequest) -> Self {
        self.imports.push(request);
        self
    }

    /// How many instances have been built.
    #[must_use]
    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }
}

impl ProtocolFactory for FixtureFactory {
    fn imports(&self) -> Vec<ImportRequest> {
        self.imports.clone()
    }

    fn instantiate(
        &self,
        event: BoundEvent,
        _ctx: ProtocolContext,
    ) -> ProtocolResult<Box<dyn Protocol>> {
        self.instances.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureInstance {
            behavior: self.behavior.clone(),
            event,
        }))
    }
}

struct FixtureInstance {
    behavior: FixtureBehavior,
    event: BoundEvent,
}

impl Protocol for FixtureInstance {
    fn compute(&mut self) -> ProtocolResult<Vec<Value>> {
        match &self.behavior {
            FixtureBehavior::Emit(effects) => Ok(effects.clone()),
            FixtureBehavior::Fail(message) => Err(ProtocolError::failed(message.clone())),
            FixtureBehavior::Panic(message) => panic!("{message}"),
            FixtureBehavior::Slow(delay, effects) => {
                std::thread::sleep(*delay);
                Ok(effects.clone())
            },
            FixtureBehavior::Echo => Ok(vec![serde_json::json!({
                "type": "LOG",
                "payload": serde_json::to_value(&self.event)?,
            })]),
        }
    }
}

fn descriptor<const N: usize>(
    plugin: &str,
    name: &str,
    responds_to: [&str; N],
    factory: FixtureFactory,
) -> ProtocolDescriptor {
    ProtocolDescriptor::native(
        test_protocol_id(plugin, name),
        responds_to.map(test_event_type),
        Arc::new(factory),
    )
}

/// A protocol that returns `effects`.
#[must_use]
pub fn static_protocol<const N: usize>(
    plugin: &str,
    name: &str,
    responds_to: [&str; N],
    effects: Vec<Value>,
) -> ProtocolDescriptor {
    descriptor(plugin, name, responds_to, FixtureFactory::new(FixtureBehavior::Emit(effects)))
}

/// A protocol whose `compute` fails.
#[must_use]
pub fn failing_protocol<const N: usize>(
    plugin: &str,
    name: &str,
    responds_to: [&str; N],
    message: &str,
) -> ProtocolDescriptor {
    descriptor(
        plugin,
        name,
        responds_to,
        FixtureFactory::new(FixtureBehavior::Fail(message.to_string())),
    )
}

/// A protocol whose `compute` panics.
#[must_use]
pub fn panicking_protocol<const N: usize>(
    plugin: &str,
    name: &str,
    responds_to: [&str; N],
    message: &str,
) -> ProtocolDescriptor {
    descriptor(
        plugin,
        name,
        responds_to,
        FixtureFactory::new(FixtureBehavior::Panic(message.to_string())),
    )
}

/// A protocol that sleeps for `delay` before returning `effects`.
#[must_use]
pub fn slow_protocol<const N: usize>(
    plugin: &str,
    name: &str,
    responds_to: [&str; N],
    delay: Duration,
    effects: Vec<Value>,
) -> ProtocolDescriptor {
    descriptor(
        plugin,
        name,
        responds_to,
        FixtureFactory::new(FixtureBehavior::Slow(delay, effects)),
    )
}

/// A protocol that imports `module` and would otherwise return `effects`.
#[must_use]
pub fn importing_protocol<const N: usize>(
    plugin: &str,
    name: &str,
    responds_to: [&str; N],
    module: &str,
    effects: Vec<Value>,
) -> ProtocolDescriptor {
    descriptor(
        plugin,
        name,
        responds_to,
        FixtureFactory::new(FixtureBehavior::Emit(effects)).with_import(ImportRequest::new(module)),
    )
}

/// A protocol that echoes the bound event as a `LOG` payload.
#[must_use]
pub fn echo_protocol<const N: usize>(
    plugin: &str,
    name: &str,
    responds_to: [&str; N],
) -> ProtocolDescriptor {
    descriptor(plugin, name, responds_to, FixtureFactory::new(FixtureBehavior::Echo))
}
