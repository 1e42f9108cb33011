//! Per-dispatch correlation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation data for one dispatch call.
///
/// Every log line emitted while a dispatch runs is recorded inside the span
/// returned by [`DispatchContext::span`], so handler failures can be traced
/// back to the event that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchContext {
    /// Unique dispatch identifier.
    pub dispatch_id: Uuid,
    /// Routing key of the dispatched event.
    pub event_type: String,
    /// Identifier of the event's target object, if any.
    pub target_id: Option<String>,
    /// When the dispatch started.
    pub started_at: DateTime<Utc>,
}

impl DispatchContext {
    /// Create a context for a new dispatch.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            dispatch_id: Uuid::new_v4(),
            event_type: event_type.into(),
            target_id: None,
            started_at: Utc::now(),
        }
    }

    /// Set the target identifier.
    #[must_use]
    pub fn with_target_id(mut self, id: impl Into<String>) -> Self {
        self.target_id = Some(id.into());
        self
    }

    /// Milliseconds since the dispatch started. Never negative.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        u64::try_from(elapsed.num_milliseconds()).unwrap_or(0)
    }

    /// A tracing span carrying this context's fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "dispatch",
            dispatch_id = %self.dispatch_id,
            event_type = %self.event_type,
            target = self.target_id.as_deref(),
        )
    }
}
