//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Largest WASM memory cap accepted: 4 GiB in 64 KiB pages.
const MAX_WASM_PAGES: u32 = 65_536;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found, naming the offending field.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_runtime(config)?;
    validate_logging(config)?;
    validate_plugins(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_runtime(config: &Config) -> ConfigResult<()> {
    let r = &config.runtime;

    if r.allowlist_path.as_os_str().is_empty() {
        return Err(invalid("runtime.allowlist_path", "must not be empty"));
    }

    if r.plugin_dirs.iter().any(|d| d.as_os_str().is_empty()) {
        return Err(invalid(
            "runtime.plugin_dirs",
            "entries must not be empty paths",
        ));
    }

    if r.max_payload_bytes == 0 {
        return Err(invalid(
            "runtime.max_payload_bytes",
            "must be greater than zero",
        ));
    }

    if r.wasm_memory_max_pages == 0 || r.wasm_memory_max_pages > MAX_WASM_PAGES {
        return Err(invalid(
            "runtime.wasm_memory_max_pages",
            format!("must be between 1 and {MAX_WASM_PAGES}"),
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    let valid_targets = ["stderr", "stdout", "file"];
    if !valid_targets.contains(&config.logging.target.as_str()) {
        return Err(invalid(
            "logging.target",
            format!(
                "unsupported log target '{}'; expected one of: {}",
                config.logging.target,
                valid_targets.join(", ")
            ),
        ));
    }

    let valid_rotations = ["daily", "hourly", "never"];
    if !valid_rotations.contains(&config.logging.rotation.as_str()) {
        return Err(invalid(
            "logging.rotation",
            format!(
                "unsupported rotation '{}'; expected one of: {}",
                config.logging.rotation,
                valid_rotations.join(", ")
            ),
        ));
    }

    if config.logging.target == "file" {
        if config.logging.directory.as_os_str().is_empty() {
            return Err(invalid(
                "logging.directory",
                "must not be empty when logging.target is \"file\"",
            ));
        }
        if config.logging.file_prefix.is_empty() {
            return Err(invalid(
                "logging.file_prefix",
                "must not be empty when logging.target is \"file\"",
            ));
        }
    }

    Ok(())
}

fn validate_plugins(config: &Config) -> ConfigResult<()> {
    for name in config.plugins.keys() {
        let mut chars = name.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_lowercase())
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(invalid(
                format!("plugins.{name}"),
                "plugin names must start with a lowercase letter and contain only [a-z0-9_]",
            ));
        }
    }
    Ok(())
}
