//! `Plugin.toml` manifests.
//!
//! ```toml
//! [package]
//! name = "urgent_task_banner"
//! version = "0.1.0"
//! secrets = ["API_KEY"]
//!
//! [[protocol]]
//! name = "banner_manager"
//! module = "protocols/banner_manager.wasm"
//! responds_to = ["TASK_CREATED", "TASK_PRIORITY_CHANGED"]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use caduceus_core::{EventType, PluginName, ProtocolId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::descriptor::ProtocolDescriptor;
use crate::error::{RuntimeError, RuntimeResult};
use crate::protocol::Secrets;

/// Entrypoint export used when a protocol entry names none.
pub const DEFAULT_ENTRYPOINT: &str = "compute";

fn default_entrypoint() -> String {
    DEFAULT_ENTRYPOINT.to_string()
}

/// A parsed plugin manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginManifest {
    /// Package metadata.
    pub package: PackageSection,
    /// Protocols in declaration order.
    #[serde(rename = "protocol", default)]
    pub protocols: Vec<ProtocolEntry>,
}

/// The `[package]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    /// Plugin name, also the package its protocols may import from.
    pub name: PluginName,
    /// Plugin version.
    pub version: String,
    /// Human-readable summary.
    #[serde(default)]
    pub description: Option<String>,
    /// Names of secrets the plugin reads.
    #[serde(default)]
    pub secrets: Vec<String>,
}

/// One `[[protocol]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolEntry {
    /// Protocol name, unique within the plugin.
    pub name: String,
    /// WASM module path, relative to the plugin directory.
    pub module: PathBuf,
    /// Exported function called per event.
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    /// Event types the protocol handles.
    #[serde(default)]
    pub responds_to: Vec<EventType>,
}

impl PluginManifest {
    /// Parse and validate manifest text. `path` is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ManifestParse`] for malformed TOML and
    /// [`RuntimeError::ManifestInvalid`] if validation fails.
    pub fn from_toml(text: &str, path: &Path) -> RuntimeResult<Self> {
        let manifest: Self = toml::from_str(text).map_err(|e| RuntimeError::ManifestParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Read, parse and validate a manifest file.
    ///
    /// # Errors
    ///
    /// See [`PluginManifest::from_toml`]; unreadable files give
    /// [`RuntimeError::Io`].
    pub fn load(path: &Path) -> RuntimeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RuntimeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// The plugin name.
    #[must_use]
    pub fn name(&self) -> &PluginName {
        &self.package.name
    }

    /// Check protocol names, module paths and entrypoints.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ManifestInvalid`] describing the first
    /// problem found.
    pub fn validate(&self, path: &Path) -> RuntimeResult<()> {
        let invalid = |message: String| RuntimeError::ManifestInvalid {
            path: path.to_path_buf(),
            message,
        };

        let mut names = BTreeSet::new();
        for entry in &self.protocols {
            ProtocolId::new(self.package.name.clone(), entry.name.as_str())
                .map_err(|e| invalid(e.to_string()))?;
            if !names.insert(entry.name.as_str()) {
                return Err(invalid(format!("duplicate protocol '{}'", entry.name)));
            }
            if entry.entrypoint.is_empty() {
                return Err(invalid(format!(
                    "protocol '{}' has an empty entrypoint",
                    entry.name
                )));
            }
            let escapes = entry
                .module
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if entry.module.as_os_str().is_empty() || escapes {
                return Err(invalid(format!(
                    "protocol '{}' module must be a relative path inside the plugin directory",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    /// The declared secrets present in `configured`. Declared secrets that
    /// are missing are logged; undeclared ones are ignored.
    #[must_use]
    pub fn select_secrets(&self, configured: &BTreeMap<String, String>) -> Secrets {
        let mut secrets = Secrets::new();
        for name in &self.package.secrets {
            match configured.get(name) {
                Some(value) => {
                    secrets.insert(name.clone(), value.clone());
                },
                None => warn!(
                    plugin = %self.package.name,
                    secret = %name,
                    "Declared secret is not configured"
                ),
            }
        }
        secrets
    }

    /// Descriptors for every protocol, with module paths resolved against
    /// `plugin_dir`.
    #[must_use]
    pub fn descriptors(&self, plugin_dir: &Path, secrets: &Secrets) -> Vec<ProtocolDescriptor> {
        self.protocols
            .iter()
            .filter_map(|entry| {
                let id = ProtocolId::new(self.package.name.clone(), entry.name.as_str()).ok()?;
                Some(
                    ProtocolDescriptor::wasm(
                        id,
                        entry.responds_to.iter().cloned(),
                        plugin_dir.join(&entry.module),
                        entry.entrypoint.clone(),
                    )
                    .with_secrets(secrets.clone()),
                )
            })
            .collect()
    }
}
