//! Plugin discovery from configured directories.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::manifest::PluginManifest;

/// Plugin manifest file name.
pub const MANIFEST_FILE_NAME: &str = "Plugin.toml";

/// A plugin found on disk.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    /// Its manifest.
    pub manifest: PluginManifest,
    /// The directory holding `Plugin.toml`; module paths resolve against it.
    pub dir: PathBuf,
}

/// Discover plugins in each of `dirs`, in order.
///
/// Missing directories are skipped. Within a directory, plugins are
/// returned sorted by subdirectory name. A bad manifest is logged and
/// skipped without affecting the others.
#[must_use]
pub fn discover_plugins(dirs: &[PathBuf]) -> Vec<DiscoveredPlugin> {
    let mut plugins = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            debug!(path = %dir.display(), "Plugin directory does not exist, skipping");
            continue;
        }
        match load_plugins_from_dir(dir) {
            Ok(found) => plugins.extend(found),
            Err(e) => warn!(path = %dir.display(), error = %e, "Failed to scan plugin directory"),
        }
    }

    info!(count = plugins.len(), "Discovered plugins");
    plugins
}

/// Load every plugin in the subdirectories of `dir`.
///
/// # Errors
///
/// Returns [`RuntimeError::Io`] if `dir` cannot be listed. Errors in
/// individual manifests are logged, not returned.
pub fn load_plugins_from_dir(dir: &Path) -> RuntimeResult<Vec<DiscoveredPlugin>> {
    let io_err = |source| RuntimeError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() && path.join(MANIFEST_FILE_NAME).is_file() {
            subdirs.push(path);
        }
    }
    subdirs.sort();

    let mut plugins = Vec::with_capacity(subdirs.len());
    for plugin_dir in subdirs {
        let manifest_path = plugin_dir.join(MANIFEST_FILE_NAME);
        match PluginManifest::load(&manifest_path) {
            Ok(manifest) => {
                debug!(
                    path = %manifest_path.display(),
                    plugin = %manifest.package.name,
                    protocols = manifest.protocols.len(),
                    "Loaded plugin manifest"
                );
                plugins.push(DiscoveredPlugin {
                    manifest,
                    dir: plugin_dir,
                });
            },
            Err(e) => {
                warn!(
                    path = %manifest_path.display(),
                    error = %e,
                    "Failed to load plugin manifest"
                );
            },
        }
    }

    Ok(plugins)
}
