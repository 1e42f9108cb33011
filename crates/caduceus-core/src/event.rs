//! Inbound domain events and their bound form.
//!
//! An [`Event`] carries its context as serialized JSON text, exactly as it
//! was produced upstream. Protocol instances never see that text directly:
//! the loader [binds](Event::bind) the event first, decoding the context
//! into a JSON object. A context that does not decode to an object fails
//! binding, and that failure belongs to the handler being constructed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Routing key for an event, e.g. `TASK_CREATED`.
///
/// The vocabulary is defined upstream and is opaque to the runtime; only its
/// shape is checked: non-empty, ASCII uppercase letters, digits and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EventType(String);

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl EventType {
    /// Create a validated event type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEventType`] if the key is empty or has
    /// characters outside `[A-Z0-9_]`.
    pub fn new(key: impl Into<String>) -> CoreResult<Self> {
        let key = key.into();
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if valid {
            Ok(Self(key))
        } else {
            Err(CoreError::InvalidEventType(key))
        }
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for EventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// The domain object an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTarget {
    /// Identifier of the target object.
    pub id: String,
    /// Kind of the target object (e.g. `Patient`), if known.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl EventTarget {
    /// Create a target with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
        }
    }

    /// Set the target kind.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// An inbound event, immutable once handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Routing key.
    pub event_type: EventType,
    /// Target object, if the event has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EventTarget>,
    /// Serialized JSON context. Accepts an inline object on input.
    #[serde(default, deserialize_with = "deserialize_context")]
    pub context: String,
}

/// Context arrives either as JSON text or, from some producers, inline.
fn deserialize_context<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

impl Event {
    /// Create an event with no target and an empty context.
    #[must_use]
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            target: None,
            context: String::new(),
        }
    }

    /// Set the target.
    #[must_use]
    pub fn with_target(mut self, target: EventTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the context from structured data.
    #[must_use]
    pub fn with_context(mut self, context: &Value) -> Self {
        self.context = context.to_string();
        self
    }

    /// Set the context text verbatim.
    #[must_use]
    pub fn with_raw_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Decode the context and produce the view a protocol instance gets.
    ///
    /// An empty (or all-whitespace) context binds as an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ContextDecode`] if the context is not valid JSON
    /// and [`CoreError::ContextNotObject`] if it is valid JSON of another
    /// shape.
    pub fn bind(&self) -> CoreResult<BoundEvent> {
        let context = if self.context.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&self.context) {
                Ok(Value::Object(map)) => map,
                Ok(other) => return Err(CoreError::ContextNotObject(json_kind(&other))),
                Err(e) => return Err(CoreError::ContextDecode(e.to_string())),
            }
        };

        Ok(BoundEvent {
            event_type: self.event_type.clone(),
            target: self.target.clone(),
            context,
        })
    }
}

/// An event whose context has been decoded for a protocol instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundEvent {
    /// Routing key.
    pub event_type: EventType,
    /// Target object, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<EventTarget>,
    /// Decoded context.
    pub context: Map<String, Value>,
}

/// Short description of a JSON value's shape, for error messages.
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
