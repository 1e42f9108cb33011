use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the allow-list or inspecting plugin modules.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The allow-list artifact does not exist.
    #[error("allow-list not found at {0}")]
    AllowListNotFound(PathBuf),

    /// The allow-list artifact exists but could not be read.
    #[error("failed to read allow-list at {path}: {source}")]
    AllowListRead {
        /// Path of the artifact.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The allow-list artifact is not valid JSON of the expected shape.
    #[error("failed to parse allow-list: {0}")]
    AllowListParse(String),

    /// The artifact declares a format version this runtime does not read.
    #[error("unsupported allow-list version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the artifact.
        found: u64,
        /// Version this runtime reads.
        expected: u32,
    },

    /// A module name in the allow-list is malformed.
    #[error("invalid module name '{0}'")]
    InvalidModuleName(String),

    /// A plugin binary could not be parsed.
    #[error("invalid WASM module: {0}")]
    InvalidWasm(String),
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;
