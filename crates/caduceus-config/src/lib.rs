#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the Caduceus plugin runtime.
//!
//! # Usage
//!
//! ```rust,no_run
//! use caduceus_config::Config;
//!
//! let resolved = Config::load(Some(std::path::Path::new("caduceus.toml"))).unwrap();
//! println!("allow-list: {}", resolved.config.runtime.allowlist_path.display());
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit file** (`--config PATH`)
//! 2. **User** (`~/.caduceus/config.toml`)
//! 3. **Environment variables** (`CADUCEUS_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! Relative paths in a file are resolved against that file's directory.
//!
//! # Design
//!
//! This crate has **no dependencies on other internal caduceus crates**.
//! Conversion into runtime types happens in `caduceus-runtime::bootstrap`.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging with source tracking.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Post-merge validation.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use merge::{ConfigLayer, FieldSources};
pub use types::{Config, LoggingSection, PluginSection, RuntimeSection};

impl Config {
    /// Load configuration with the full precedence chain, reading
    /// `CADUCEUS_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a file is unreadable or malformed, or if
    /// the merged configuration fails validation.
    pub fn load(config_file: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(config_file, None)
    }
}
