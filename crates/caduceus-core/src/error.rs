//! Error types for the core data model.

use thiserror::Error;

/// Errors raised while constructing or binding core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An event type key is empty or contains characters outside `[A-Z0-9_]`.
    #[error("invalid event type '{0}': expected uppercase letters, digits and '_'")]
    InvalidEventType(String),

    /// A plugin name is not a valid package name.
    #[error("invalid plugin name '{0}': expected a lowercase letter followed by [a-z0-9_]")]
    InvalidPluginName(String),

    /// A protocol name is empty or contains invalid characters.
    #[error("invalid protocol name '{0}'")]
    InvalidProtocolName(String),

    /// An effect tag is not part of the compiled-in vocabulary.
    #[error("unknown effect type '{0}'")]
    UnknownEffectType(String),

    /// The event context is not valid JSON.
    #[error("event context is not valid JSON: {0}")]
    ContextDecode(String),

    /// The event context decoded to something other than a JSON object.
    #[error("event context must be a JSON object, found {0}")]
    ContextNotObject(&'static str),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
