//! Effect shape validation.
//!
//! Every candidate a protocol returns passes through [`EffectValidator`]
//! before it reaches the caller. Invalid candidates are dropped one at a
//! time; siblings from the same handler are unaffected.

use caduceus_core::event::json_kind;
use caduceus_core::{Effect, EffectType, ProtocolId};
use serde_json::{Map, Value};

use crate::error::EffectShapeError;

/// Default upper bound on a serialized payload (1 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1_048_576;

/// Checks raw effect values against the effect schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectValidator {
    max_payload_bytes: usize,
}

impl Default for EffectValidator {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl EffectValidator {
    /// Create a validator with the default payload limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the payload size limit in bytes.
    #[must_use]
    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }

    /// The payload size limit in bytes.
    #[must_use]
    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Validate one raw effect produced by `handler`.
    ///
    /// Accepts `{"type": TAG, "payload": {...}}`, with `effect_type` as an
    /// alias for `type`. A payload given as JSON text is decoded.
    ///
    /// # Errors
    ///
    /// Returns an [`EffectShapeError`] naming the offending field.
    pub fn validate(&self, handler: &ProtocolId, raw: Value) -> Result<Effect, EffectShapeError> {
        let reject = |field: &str, reason: String| EffectShapeError {
            handler: handler.clone(),
            field: field.to_string(),
            reason,
        };

        let Value::Object(mut fields) = raw else {
            return Err(reject(
                "effect",
                format!("expected an object, found {}", json_kind(&raw)),
            ));
        };

        let tag = match (fields.remove("type"), fields.remove("effect_type")) {
            (Some(_), Some(_)) => {
                return Err(reject(
                    "type",
                    "both 'type' and 'effect_type' are present".to_string(),
                ));
            },
            (Some(tag), None) | (None, Some(tag)) => tag,
            (None, None) => return Err(reject("type", "missing".to_string())),
        };
        let payload = fields
            .remove("payload")
            .ok_or_else(|| reject("payload", "missing".to_string()))?;

        if let Some(extra) = fields.keys().next() {
            return Err(reject(extra, "unexpected field".to_string()));
        }

        let Value::String(tag) = tag else {
            return Err(reject(
                "type",
                format!("expected a string, found {}", json_kind(&tag)),
            ));
        };
        let effect_type = EffectType::from_tag(&tag)
            .ok_or_else(|| reject("type", format!("unknown effect type '{tag}'")))?;

        let payload = decode_payload(payload).map_err(|reason| reject("payload", reason))?;

        let size = serde_json::to_vec(&payload)
            .map_err(|e| reject("payload", e.to_string()))?
            .len();
        if size > self.max_payload_bytes {
            return Err(reject(
                "payload",
                format!(
                    "{size} bytes exceeds the {} byte limit",
                    self.max_payload_bytes
                ),
            ));
        }

        Ok(Effect::new(effect_type, Value::Object(payload)))
    }
}

fn decode_payload(payload: Value) -> Result<Map<String, Value>, String> {
    match payload {
        Value::Object(map) => Ok(map),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!(
                "JSON text must decode to an object, found {}",
                json_kind(&other)
            )),
            Err(e) => Err(format!("invalid JSON text: {e}")),
        },
        other => Err(format!("expected an object, found {}", json_kind(&other))),
    }
}
