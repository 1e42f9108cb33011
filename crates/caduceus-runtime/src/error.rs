//! Runtime error types.
//!
//! Handler-local failures ([`HandlerError`], [`EffectShapeError`]) are
//! recovered at the dispatcher boundary and never escape a dispatch call.
//! Only [`StartupError`] is fatal.

use std::path::PathBuf;

use caduceus_config::ConfigError;
use caduceus_core::{DiagnosticKind, PluginName, ProtocolId};
use caduceus_sandbox::{ImportDenied, SandboxError};

/// Error returned by a protocol instance.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The protocol's own logic failed.
    #[error("{0}")]
    Failed(String),

    /// The bound event did not have the shape the protocol expects.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A JSON value could not be produced or read.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Shorthand for [`ProtocolError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result type for protocol code.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Why one handler produced no effects.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// An import was refused by the guard.
    #[error(transparent)]
    ImportDenied(#[from] ImportDenied),

    /// The module could not be read, parsed or instantiated.
    #[error("load error: {0}")]
    Load(String),

    /// The event did not bind, or the factory refused to build an instance.
    #[error("construction error: {0}")]
    Construction(String),

    /// `compute` returned an error or the guest trapped.
    #[error("execution error: {0}")]
    Execution(String),

    /// The handler exceeded its wall-clock limit.
    #[error("timed out after {timeout_ms}ms")]
    Timeout {
        /// The limit that was exceeded.
        timeout_ms: u64,
    },

    /// The handler panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// The diagnostic category for this failure.
    #[must_use]
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::ImportDenied(_) => DiagnosticKind::ImportDenied,
            Self::Load(_) => DiagnosticKind::LoadError,
            Self::Construction(_) => DiagnosticKind::ConstructionError,
            Self::Execution(_) => DiagnosticKind::HandlerExecutionError,
            Self::Timeout { .. } => DiagnosticKind::HandlerTimeout,
            Self::Panicked(_) => DiagnosticKind::HandlerPanicked,
        }
    }
}

/// A candidate effect that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid effect from {handler}: {field}: {reason}")]
pub struct EffectShapeError {
    /// Protocol that produced the effect.
    pub handler: ProtocolId,
    /// Offending field (`type`, `payload`, or the whole `effect`).
    pub field: String,
    /// What was wrong with it.
    pub reason: String,
}

/// Registry mutation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A protocol with this id is already registered.
    #[error("protocol already registered: {0}")]
    DuplicateProtocol(ProtocolId),
}

/// Errors that abort runtime startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The allow-list artifact is missing or malformed.
    #[error("allow-list: {0}")]
    AllowList(#[from] SandboxError),

    /// The configuration is invalid.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// A compiled-in protocol could not be registered.
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),

    /// A compiled-in protocol belongs to a plugin named after a host package.
    #[error("plugin name '{plugin}' shadows host package '{package}'")]
    ShadowedPackage {
        /// Offending plugin.
        plugin: PluginName,
        /// Host package or allow-list entry it collides with.
        package: String,
    },
}

/// Errors from plugin discovery and manifest handling.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A `Plugin.toml` is not valid TOML of the expected shape.
    #[error("manifest parse error in {path}: {message}")]
    ManifestParse {
        /// Path to the manifest file.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// A `Plugin.toml` parsed but describes an unusable plugin.
    #[error("invalid manifest {path}: {message}")]
    ManifestInvalid {
        /// Path to the manifest file.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// A plugin file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for discovery and manifest operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
