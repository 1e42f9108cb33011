//! Event dispatch.
//!
//! The [`Dispatcher`] resolves the handlers subscribed to an event type and
//! runs them one after another, each behind its own isolation boundary: the
//! instance is loaded and computed on a blocking thread, so a panic, an
//! error, a denied import or a timeout in one handler costs only that
//! handler's effects.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use caduceus_core::{
    Diagnostic, DiagnosticKind, DiagnosticSink, Effect, Event, EventType, PluginName,
};
use caduceus_telemetry::{DispatchContext, TracingSink};
use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug};
use uuid::Uuid;

use crate::descriptor::ProtocolDescriptor;
use crate::error::HandlerError;
use crate::loader::{InstanceLimits, PluginLoader};
use crate::outcome::{DispatchCancelled, DispatchReport, HandlerRecord};
use crate::registry::ProtocolRegistry;
use crate::timeout::{NoTimeout, TimeoutPolicy};
use crate::validator::EffectValidator;

/// Routes events to protocols and aggregates their effects.
///
/// `Dispatcher` is `Send + Sync`; share it behind an `Arc` to dispatch
/// independent events concurrently. Each dispatch reads one registry
/// snapshot, so a concurrent [`replace_registry`](Self::replace_registry)
/// never changes the handler set of a dispatch already in progress.
pub struct Dispatcher {
    registry: ArcSwap<ProtocolRegistry>,
    loader: PluginLoader,
    validator: EffectValidator,
    timeouts: Arc<dyn TimeoutPolicy>,
    sink: Arc<dyn DiagnosticSink>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("protocols", &self.registry.load().len())
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no timeout, the default validator and
    /// diagnostics forwarded to `tracing`.
    #[must_use]
    pub fn new(registry: ProtocolRegistry, loader: PluginLoader) -> Self {
        Self {
            registry: ArcSwap::from_pointee(registry),
            loader,
            validator: EffectValidator::default(),
            timeouts: Arc::new(NoTimeout),
            sink: Arc::new(TracingSink),
        }
    }

    /// Set the effect validator.
    #[must_use]
    pub fn with_validator(mut self, validator: EffectValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Set the per-handler timeout policy.
    #[must_use]
    pub fn with_timeout_policy(mut self, policy: Arc<dyn TimeoutPolicy>) -> Self {
        self.timeouts = policy;
        self
    }

    /// Set the diagnostic sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The current registry snapshot.
    #[must_use]
    pub fn registry(&self) -> Arc<ProtocolRegistry> {
        self.registry.load_full()
    }

    /// Publish a new registry, returning the previous one. Dispatches
    /// already running keep the snapshot they started with.
    pub fn replace_registry(&self, registry: ProtocolRegistry) -> Arc<ProtocolRegistry> {
        self.registry.swap(Arc::new(registry))
    }

    /// Publish a copy of the current registry without `plugin`'s protocols.
    /// Returns how many were removed.
    pub fn unregister_plugin(&self, plugin: &PluginName) -> usize {
        let mut removed = 0;
        self.registry.rcu(|current| {
            let mut next = ProtocolRegistry::clone(current);
            removed = next.unregister_plugin(plugin);
            next
        });
        removed
    }

    /// The loader used for every handler.
    #[must_use]
    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// Dispatch `event` and return the validated effects of every handler
    /// that succeeded, in handler order. Never fails; with no subscribed
    /// handlers the list is empty.
    pub async fn dispatch(&self, event: impl Into<Arc<Event>>) -> Vec<Effect> {
        self.dispatch_report(event).await.effects
    }

    /// Like [`dispatch`](Self::dispatch), also returning one record per
    /// handler.
    pub async fn dispatch_report(&self, event: impl Into<Arc<Event>>) -> DispatchReport {
        let event = event.into();
        let event_type = event.event_type.clone();
        match self
            .dispatch_cancellable(event, &CancellationToken::new())
            .await
        {
            Ok(report) => report,
            Err(_) => DispatchReport {
                dispatch_id: Uuid::nil(),
                event_type,
                records: Vec::new(),
                effects: Vec::new(),
            },
        }
    }

    /// Dispatch `event`, stopping as soon as `cancel` fires.
    ///
    /// Cancellation is observed before each handler starts and while it
    /// runs. A handler already executing on a blocking thread is abandoned,
    /// not interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchCancelled`] if the token fired; every effect of the
    /// dispatch is discarded.
    pub async fn dispatch_cancellable(
        &self,
        event: impl Into<Arc<Event>>,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, DispatchCancelled> {
        let event = event.into();
        let mut ctx = DispatchContext::new(event.event_type.as_str());
        if let Some(target) = &event.target {
            ctx = ctx.with_target_id(target.id.clone());
        }
        let span = ctx.span();
        self.run(event, ctx, cancel).instrument(span).await
    }

    async fn run(
        &self,
        event: Arc<Event>,
        ctx: DispatchContext,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, DispatchCancelled> {
        let registry = self.registry.load_full();
        let handlers = registry.resolve(&event.event_type);
        let cancelled = |completed: usize| {
            debug!(completed, "Dispatch cancelled");
            DispatchCancelled {
                event_type: event.event_type.clone(),
                completed,
            }
        };

        let mut records = Vec::with_capacity(handlers.len());
        let mut effects = Vec::new();

        for descriptor in handlers {
            if cancel.is_cancelled() {
                return Err(cancelled(records.len()));
            }
            let record = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(records.len())),
                record = self.invoke(descriptor, &event) => record,
            };
            effects.extend_from_slice(record.effects());
            records.push(record);
        }

        if cancel.is_cancelled() {
            return Err(cancelled(records.len()));
        }

        debug!(
            handlers = records.len(),
            effects = effects.len(),
            elapsed_ms = ctx.elapsed_ms(),
            "Dispatch complete"
        );

        Ok(DispatchReport {
            dispatch_id: ctx.dispatch_id,
            event_type: event.event_type.clone(),
            records,
            effects,
        })
    }

    /// Load, compute and validate one handler.
    async fn invoke(&self, descriptor: &Arc<ProtocolDescriptor>, event: &Arc<Event>) -> HandlerRecord {
        let timeout = self.timeouts.timeout_for(descriptor);
        let limits = InstanceLimits::with_timeout(timeout);
        let started_at = Utc::now();
        let start = Instant::now();

        let loader = self.loader.clone();
        let task_descriptor = Arc::clone(descriptor);
        let task_event = Arc::clone(event);
        let task = tokio::task::spawn_blocking(move || -> Result<Vec<Value>, HandlerError> {
            let mut instance = loader.load(&task_descriptor, &task_event, &limits)?;
            instance
                .compute()
                .map_err(|e| HandlerError::Execution(e.to_string()))
        });

        let joined = match timeout {
            Some(limit) => tokio::time::timeout(limit, task).await.ok(),
            None => Some(task.await),
        };
        let duration = start.elapsed();

        let raw = match joined {
            None => Err(HandlerError::Timeout {
                timeout_ms: millis(timeout.unwrap_or_default()),
            }),
            Some(Ok(result)) => result.map_err(|e| reclassify(e, timeout, duration)),
            Some(Err(join_err)) => Err(from_join_error(join_err)),
        };

        let mut rejected = Vec::new();
        let outcome = raw.map(|values| {
            values
                .into_iter()
                .filter_map(|value| match self.validator.validate(&descriptor.id, value) {
                    Ok(effect) => Some(effect),
                    Err(e) => {
                        rejected.push(e);
                        None
                    },
                })
                .collect::<Vec<_>>()
        });

        match &outcome {
            Ok(accepted) => debug!(
                protocol = %descriptor.id,
                effects = accepted.len(),
                rejected = rejected.len(),
                duration_ms = millis(duration),
                "Handler completed"
            ),
            Err(e) => self.report(descriptor, &event.event_type, e.kind(), e.to_string()),
        }
        for shape in &rejected {
            self.report(
                descriptor,
                &event.event_type,
                DiagnosticKind::EffectShapeError,
                format!("{}: {}", shape.field, shape.reason),
            );
        }

        HandlerRecord {
            protocol: descriptor.id.clone(),
            event_type: event.event_type.clone(),
            outcome,
            rejected,
            started_at,
            duration,
        }
    }

    fn report(
        &self,
        descriptor: &ProtocolDescriptor,
        event_type: &EventType,
        kind: DiagnosticKind,
        message: String,
    ) {
        self.sink.record(&Diagnostic {
            plugin: descriptor.plugin().clone(),
            protocol: descriptor.id.clone(),
            event_type: event_type.clone(),
            kind,
            message,
        });
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// A WASM guest interrupted by its own wall-clock limit surfaces as an
/// execution error; report it as a timeout.
fn reclassify(err: HandlerError, timeout: Option<Duration>, elapsed: Duration) -> HandlerError {
    match (err, timeout) {
        (HandlerError::Execution(_), Some(limit)) if elapsed >= limit => HandlerError::Timeout {
            timeout_ms: millis(limit),
        },
        (err, _) => err,
    }
}

fn from_join_error(err: JoinError) -> HandlerError {
    if !err.is_panic() {
        return HandlerError::Execution(format!("handler task aborted: {err}"));
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    HandlerError::Panicked(message)
}
