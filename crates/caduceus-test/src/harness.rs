//! Test harness helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use caduceus_core::{EventType, PluginName};
use caduceus_runtime::manifest::{PackageSection, ProtocolEntry};
use caduceus_runtime::{
    Dispatcher, EffectValidator, FixedTimeout, PluginLoader, PluginManifest, ProtocolDescriptor,
    ProtocolRegistry, WasmEngine,
};
use caduceus_sandbox::{AllowList, ImportGuard};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::fixtures::test_allowlist;
use crate::mocks::MemorySink;
use crate::wasm::GuestModule;

/// Set up test logging with the given filter.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging with the default filter (warn level).
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}

/// Builds a [`Dispatcher`] wired to a [`MemorySink`].
#[derive(Debug)]
pub struct DispatchHarness {
    registry: ProtocolRegistry,
    allowlist: AllowList,
    timeout: Option<Duration>,
    validator: EffectValidator,
    engine: WasmEngine,
}

impl Default for DispatchHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchHarness {
    /// An empty registry behind the test allow-list, with no timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ProtocolRegistry::new(),
            allowlist: test_allowlist(),
            timeout: None,
            validator: EffectValidator::new(),
            engine: WasmEngine::new(),
        }
    }

    /// Register a protocol.
    ///
    /// # Panics
    ///
    /// Panics if the protocol id is already registered.
    #[must_use]
    pub fn with_protocol(mut self, descriptor: ProtocolDescriptor) -> Self {
        self.registry
            .register(descriptor)
            .expect("duplicate protocol in harness");
        self
    }

    /// Replace the allow-list.
    #[must_use]
    pub fn with_allowlist(mut self, allowlist: AllowList) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Apply one wall-clock limit to every handler.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the effect validator.
    #[must_use]
    pub fn with_validator(mut self, validator: EffectValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the WASM engine.
    #[must_use]
    pub fn with_wasm_engine(mut self, engine: WasmEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Build the dispatcher and the sink it reports to.
    #[must_use]
    pub fn build(self) -> (Dispatcher, Arc<MemorySink>) {
        let guard = Arc::new(ImportGuard::new(Arc::new(self.allowlist)));
        let loader = PluginLoader::new(guard).with_wasm_engine(self.engine);
        let sink = Arc::new(MemorySink::new());

        let mut dispatcher = Dispatcher::new(self.registry, loader)
            .with_validator(self.validator)
            .with_sink(sink.clone());
        if let Some(timeout) = self.timeout {
            dispatcher = dispatcher.with_timeout_policy(Arc::new(FixedTimeout(timeout)));
        }
        (dispatcher, sink)
    }
}

/// Writes an installed plugin (`Plugin.toml` plus modules) to disk.
#[derive(Debug, Clone)]
pub struct PluginDir {
    name: PluginName,
    secrets: Vec<String>,
    protocols: Vec<(ProtocolEntry, Vec<u8>)>,
}

impl PluginDir {
    /// A plugin with no protocols.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid plugin name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: PluginName::new(name).expect("invalid plugin name"),
            secrets: Vec::new(),
            protocols: Vec::new(),
        }
    }

    /// Declare a secret.
    #[must_use]
    pub fn with_secret(mut self, name: &str) -> Self {
        self.secrets.push(name.to_string());
        self
    }

    /// Add a protocol backed by `guest`, stored at `protocols/<name>.wasm`.
    ///
    /// # Panics
    ///
    /// Panics if an event type key is invalid.
    #[must_use]
    pub fn with_protocol<const N: usize>(
        mut self,
        name: &str,
        responds_to: [&str; N],
        guest: &GuestModule,
    ) -> Self {
        let entry = ProtocolEntry {
            name: name.to_string(),
            module: PathBuf::from("protocols").join(format!("{name}.wasm")),
            entrypoint: guest.export_name().to_string(),
            responds_to: responds_to
                .iter()
                .map(|key| EventType::new(*key).expect("invalid event type"))
                .collect(),
        };
        self.protocols.push((entry, guest.build()));
        self
    }

    /// The manifest this plugin writes.
    #[must_use]
    pub fn manifest(&self) -> PluginManifest {
        PluginManifest {
            package: PackageSection {
                name: self.name.clone(),
                version: "0.1.0".to_string(),
                description: None,
                secrets: self.secrets.clone(),
            },
            protocols: self.protocols.iter().map(|(entry, _)| entry.clone()).collect(),
        }
    }

    /// Write the plugin to `root/<name>` and return that directory.
    ///
    /// # Panics
    ///
    /// Panics if any file cannot be written.
    #[must_use]
    pub fn write_to(&self, root: &Path) -> PathBuf {
        let dir = root.join(self.name.as_str());
        for (entry, bytes) in &self.protocols {
            let path = dir.join(&entry.module);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("failed to create protocol directory");
            }
            std::fs::write(&path, bytes).expect("failed to write module");
        }
        std::fs::create_dir_all(&dir).expect("failed to create plugin directory");
        let text = toml::to_string(&self.manifest()).expect("failed to serialize manifest");
        std::fs::write(dir.join(caduceus_runtime::discovery::MANIFEST_FILE_NAME), text)
            .expect("failed to write manifest");
        dir
    }
}

/// A temporary directory holding an allow-list file and a plugin root.
#[derive(Debug)]
pub struct Workspace {
    /// The temporary directory.
    pub dir: TempDir,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Create the directory and write [`test_allowlist`] to
    /// `allowlist.json`.
    ///
    /// # Panics
    ///
    /// Panics if the directory or file cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp directory");
        let text = test_allowlist()
            .to_json_pretty()
            .expect("failed to serialize allow-list");
        std::fs::write(dir.path().join("allowlist.json"), text)
            .expect("failed to write allow-list");
        std::fs::create_dir_all(dir.path().join("plugins"))
            .expect("failed to create plugin root");
        Self { dir }
    }

    /// Path of the allow-list file.
    #[must_use]
    pub fn allowlist_path(&self) -> PathBuf {
        self.dir.path().join("allowlist.json")
    }

    /// Directory plugins are installed into.
    #[must_use]
    pub fn plugin_root(&self) -> PathBuf {
        self.dir.path().join("plugins")
    }

    /// Install `plugin` under the plugin root.
    #[must_use]
    pub fn install(&self, plugin: &PluginDir) -> PathBuf {
        plugin.write_to(&self.plugin_root())
    }
}
