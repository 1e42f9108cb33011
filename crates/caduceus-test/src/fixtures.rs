//! Test fixtures for common types.

use caduceus_core::{Event, EventTarget, EventType, PluginName, ProtocolId};
use caduceus_sandbox::host::SDK_MODULES;
use caduceus_sandbox::{AllowList, AllowListBuilder};
use serde_json::{Value, json};

/// Create an event type.
///
/// # Panics
///
/// Panics if `key` is not a valid event type.
#[must_use]
pub fn test_event_type(key: &str) -> EventType {
    EventType::new(key).expect("invalid test event type")
}

/// Create an event with an empty context.
#[must_use]
pub fn test_event(key: &str) -> Event {
    Event::new(test_event_type(key)).with_raw_context("{}")
}

/// Create an event with the given context and a target.
#[must_use]
pub fn test_event_with(key: &str, target_id: &str, context: &Value) -> Event {
    Event::new(test_event_type(key))
        .with_target(EventTarget::new(target_id).with_kind("Patient"))
        .with_context(context)
}

/// A `TASK_CREATED` event for an urgent task.
#[must_use]
pub fn urgent_task_event() -> Event {
    test_event_with(
        "TASK_CREATED",
        "task-1",
        &json!({"task": {"id": "task-1", "title": "Call patient", "priority": "urgent"}}),
    )
}

/// Create a plugin name.
///
/// # Panics
///
/// Panics if `name` is not a valid plugin name.
#[must_use]
pub fn test_plugin(name: &str) -> PluginName {
    PluginName::new(name).expect("invalid test plugin name")
}

/// Create a protocol id.
///
/// # Panics
///
/// Panics if either part is invalid.
#[must_use]
pub fn test_protocol_id(plugin: &str, name: &str) -> ProtocolId {
    ProtocolId::new(test_plugin(plugin), name).expect("invalid test protocol name")
}

/// A raw effect as a protocol would return it.
#[must_use]
pub fn raw_effect(effect_type: &str, payload: Value) -> Value {
    json!({"type": effect_type, "payload": payload})
}

/// A raw `LOG` effect tagged with `marker`, handy for checking order.
#[must_use]
pub fn log_effect(marker: &str) -> Value {
    raw_effect("LOG", json!({"message": marker}))
}

/// The host default allow-list plus the SDK packages.
///
/// # Panics
///
/// Panics if the built-in module names stop validating.
#[must_use]
pub fn test_allowlist() -> AllowList {
    SDK_MODULES
        .iter()
        .fold(AllowListBuilder::host_default(), |b, m| b.allow_module(*m))
        .build()
        .expect("built-in allow-list is valid")
}
