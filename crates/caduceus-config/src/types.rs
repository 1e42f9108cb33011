//! Configuration types for the Caduceus runtime.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Plugin runtime settings.
    pub runtime: RuntimeSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
    /// Per-plugin settings, keyed by plugin name.
    pub plugins: BTreeMap<String, PluginSection>,
}

impl Config {
    /// Settings for `plugin`, if any were configured.
    #[must_use]
    pub fn plugin(&self, plugin: &str) -> Option<&PluginSection> {
        self.plugins.get(plugin)
    }

    /// Whether `plugin` should be registered. Unconfigured plugins are
    /// enabled.
    #[must_use]
    pub fn is_plugin_enabled(&self, plugin: &str) -> bool {
        self.plugin(plugin).is_none_or(|p| p.enabled)
    }
}

// ---------------------------------------------------------------------------
// RuntimeSection
// ---------------------------------------------------------------------------

/// Plugin runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Path of the import allow-list artifact. Startup fails without it.
    pub allowlist_path: PathBuf,
    /// Directories scanned for installed plugins, in order.
    pub plugin_dirs: Vec<PathBuf>,
    /// Default per-handler wall-clock limit in milliseconds. `0` disables it.
    pub handler_timeout_ms: u64,
    /// Largest serialized effect payload accepted, in bytes.
    pub max_payload_bytes: usize,
    /// Memory cap for WASM protocol instances, in 64 KiB pages.
    pub wasm_memory_max_pages: u32,
    /// Whether WASM protocols get a WASI preview 1 environment.
    pub wasi: bool,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            allowlist_path: PathBuf::from("allowlist.json"),
            plugin_dirs: vec![PathBuf::from("plugins")],
            handler_timeout_ms: 5000,
            max_payload_bytes: 1_048_576,
            wasm_memory_max_pages: 256,
            wasi: false,
        }
    }
}

impl RuntimeSection {
    /// The default handler timeout, or `None` when disabled.
    #[must_use]
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_ms > 0).then(|| Duration::from_millis(self.handler_timeout_ms))
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["caduceus_sandbox=debug"]`).
    pub directives: Vec<String>,
    /// Where log lines go: `"stderr"`, `"stdout"` or `"file"`.
    pub target: String,
    /// Directory for rolling log files when `target = "file"`. Relative
    /// paths resolve against the config file that set them.
    pub directory: PathBuf,
    /// Log file name prefix.
    pub file_prefix: String,
    /// Log file rotation: `"daily"`, `"hourly"` or `"never"`.
    pub rotation: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            target: "stderr".to_owned(),
            directory: PathBuf::from("logs"),
            file_prefix: "caduceus".to_owned(),
            rotation: "daily".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// PluginSection
// ---------------------------------------------------------------------------

/// Settings for one installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSection {
    /// Whether the plugin's protocols are registered.
    pub enabled: bool,
    /// Secret values, keyed by the names the plugin's manifest declares.
    pub secrets: BTreeMap<String, String>,
    /// Handler timeout override for this plugin, in milliseconds. `0`
    /// disables the limit.
    pub timeout_ms: Option<u64>,
}

impl Default for PluginSection {
    fn default() -> Self {
        Self {
            enabled: true,
            secrets: BTreeMap::new(),
            timeout_ms: None,
        }
    }
}
