//! Per-dispatch results.

use std::time::Duration;

use caduceus_core::{Effect, EventType, PluginName, ProtocolId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EffectShapeError, HandlerError};

/// What happened to one handler during one dispatch.
#[derive(Debug, Clone)]
pub struct HandlerRecord {
    /// The handler.
    pub protocol: ProtocolId,
    /// The dispatched event type.
    pub event_type: EventType,
    /// Accepted effects, or why the handler produced none.
    pub outcome: Result<Vec<Effect>, HandlerError>,
    /// Candidates the validator dropped.
    pub rejected: Vec<EffectShapeError>,
    /// When the handler was started.
    pub started_at: DateTime<Utc>,
    /// Load plus compute time.
    pub duration: Duration,
}

impl HandlerRecord {
    /// The owning plugin.
    #[must_use]
    pub fn plugin(&self) -> &PluginName {
        self.protocol.plugin()
    }

    /// Whether the handler completed without error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Accepted effects, empty on failure.
    #[must_use]
    pub fn effects(&self) -> &[Effect] {
        self.outcome.as_deref().unwrap_or_default()
    }
}

/// Full result of one dispatch call.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Correlation id, also recorded on the dispatch span.
    pub dispatch_id: Uuid,
    /// The dispatched event type.
    pub event_type: EventType,
    /// One record per resolved handler, in handler order.
    pub records: Vec<HandlerRecord>,
    /// Accepted effects in handler order, then handler-internal order.
    pub effects: Vec<Effect>,
}

impl DispatchReport {
    /// Records of handlers that failed.
    pub fn failures(&self) -> impl Iterator<Item = &HandlerRecord> {
        self.records.iter().filter(|r| !r.is_success())
    }
}

/// A dispatch stopped by its cancellation token. Its effects are discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dispatch of {event_type} cancelled after {completed} handler(s)")]
pub struct DispatchCancelled {
    /// The dispatched event type.
    pub event_type: EventType,
    /// Handlers that had finished before cancellation was observed.
    pub completed: usize,
}
