//! Runtime assembly from configuration.
//!
//! Startup order:
//! 1. Load the allow-list artifact (fatal if missing or malformed)
//! 2. Register compiled-in protocols (a duplicate id or a plugin name that
//!    shadows a host package is fatal)
//! 3. Discover installed plugins and register the enabled ones
//! 4. Build the dispatcher with per-plugin timeouts and the payload limit

use std::sync::Arc;

use caduceus_config::Config;
use caduceus_core::{DiagnosticSink, Effect, Event, PluginName};
use caduceus_sandbox::{AllowList, ImportGuard};
use caduceus_telemetry::TracingSink;
use tracing::{info, warn};

use crate::descriptor::ProtocolDescriptor;
use crate::discovery::discover_plugins;
use crate::dispatcher::Dispatcher;
use crate::engine::WasmEngine;
use crate::error::StartupError;
use crate::loader::PluginLoader;
use crate::registry::ProtocolRegistry;
use crate::timeout::{PluginTimeouts, TimeoutPolicy};
use crate::validator::EffectValidator;

/// A running plugin runtime.
#[derive(Debug)]
pub struct Runtime {
    dispatcher: Arc<Dispatcher>,
    config: Config,
    native: Vec<ProtocolDescriptor>,
}

impl Runtime {
    /// Start a runtime with only discovered plugins.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the allow-list cannot be loaded.
    pub fn start(config: &Config) -> Result<Self, StartupError> {
        RuntimeBuilder::new(config.clone()).build()
    }

    /// The shared dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The configuration the runtime was started with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shorthand for [`Dispatcher::dispatch`].
    pub async fn dispatch(&self, event: impl Into<Arc<Event>>) -> Vec<Effect> {
        self.dispatcher.dispatch(event).await
    }

    /// Rediscover plugins on disk and publish a fresh registry.
    ///
    /// The new registry's WASM protocols read their modules from disk again.
    /// Dispatches already running finish against the previous registry and
    /// the modules its protocols have already read.
    ///
    /// Returns the number of registered protocols.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Registry`] if compiled-in protocols collide;
    /// the previous registry stays in place.
    pub fn reload(&self) -> Result<usize, StartupError> {
        let guard = self.dispatcher.loader().guard();
        let registry = build_registry(&self.config, &self.native, guard)?;
        let count = registry.len();
        self.dispatcher.replace_registry(registry);
        info!(protocols = count, "Reloaded plugin registry");
        Ok(count)
    }

    /// Stop routing events to `plugin` without touching the rest of the
    /// registry. The plugin comes back on the next [`Runtime::reload`]
    /// unless it was removed from disk or disabled in the meantime.
    ///
    /// Returns the number of protocols removed.
    pub fn unload_plugin(&self, plugin: &PluginName) -> usize {
        let removed = self.dispatcher.unregister_plugin(plugin);
        info!(plugin = %plugin, protocols = removed, "Unloaded plugin");
        removed
    }
}

/// Builder for embedding the runtime.
pub struct RuntimeBuilder {
    config: Config,
    native: Vec<ProtocolDescriptor>,
    allowlist: Option<AllowList>,
    sink: Arc<dyn DiagnosticSink>,
    timeouts: Option<Arc<dyn TimeoutPolicy>>,
}

impl std::fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("native", &self.native.len())
            .field("has_allowlist", &self.allowlist.is_some())
            .field("has_timeout_policy", &self.timeouts.is_some())
            .finish_non_exhaustive()
    }
}

impl RuntimeBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            native: Vec::new(),
            allowlist: None,
            sink: Arc::new(TracingSink),
            timeouts: None,
        }
    }

    /// Register a compiled-in protocol. Native protocols are registered
    /// before discovered plugins, in the order added.
    #[must_use]
    pub fn with_protocol(mut self, descriptor: ProtocolDescriptor) -> Self {
        self.native.push(descriptor);
        self
    }

    /// Use this allow-list instead of reading `runtime.allowlist_path`.
    #[must_use]
    pub fn with_allowlist(mut self, allowlist: AllowList) -> Self {
        self.allowlist = Some(allowlist);
        self
    }

    /// Deliver diagnostics to `sink` instead of `tracing`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the configured per-plugin timeouts.
    #[must_use]
    pub fn with_timeout_policy(mut self, policy: Arc<dyn TimeoutPolicy>) -> Self {
        self.timeouts = Some(policy);
        self
    }

    /// Assemble the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the allow-list cannot be loaded, two
    /// compiled-in protocols share an id, or a compiled-in protocol's plugin
    /// name shadows a host package.
    pub fn build(self) -> Result<Runtime, StartupError> {
        let allowlist = match self.allowlist {
            Some(list) => list,
            None => AllowList::load_from(&self.config.runtime.allowlist_path)?,
        };
        let guard = Arc::new(ImportGuard::new(Arc::new(allowlist)));

        let registry = build_registry(&self.config, &self.native, &guard)?;

        let runtime = &self.config.runtime;
        let engine = WasmEngine::new()
            .with_memory_max_pages(runtime.wasm_memory_max_pages)
            .with_wasi(runtime.wasi);
        let loader = PluginLoader::new(guard).with_wasm_engine(engine);
        let timeouts = self
            .timeouts
            .unwrap_or_else(|| Arc::new(PluginTimeouts::from_config(&self.config)));
        let validator = EffectValidator::new().with_max_payload_bytes(runtime.max_payload_bytes);

        info!(
            protocols = registry.len(),
            event_types = registry.event_types().len(),
            "Runtime started"
        );

        let dispatcher = Dispatcher::new(registry, loader)
            .with_validator(validator)
            .with_timeout_policy(timeouts)
            .with_sink(self.sink);

        Ok(Runtime {
            dispatcher: Arc::new(dispatcher),
            config: self.config,
            native: self.native,
        })
    }
}

/// Register native protocols, then every enabled discovered plugin.
///
/// A discovered plugin whose name shadows a host package, or whose protocol
/// ids collide with one already registered, is skipped as a whole.
fn build_registry(
    config: &Config,
    native: &[ProtocolDescriptor],
    guard: &ImportGuard,
) -> Result<ProtocolRegistry, StartupError> {
    let mut registry = ProtocolRegistry::new();
    for descriptor in native {
        if let Some(package) = guard.shadowed_package(descriptor.plugin()) {
            return Err(StartupError::ShadowedPackage {
                plugin: descriptor.plugin().clone(),
                package,
            });
        }
        registry.register(descriptor.clone())?;
    }

    for plugin in discover_plugins(&config.runtime.plugin_dirs) {
        let name = plugin.manifest.name();
        if !config.is_plugin_enabled(name.as_str()) {
            info!(plugin = %name, "Plugin disabled by configuration, skipping");
            continue;
        }
        if let Some(package) = guard.shadowed_package(name) {
            warn!(
                plugin = %name,
                package = %package,
                path = %plugin.dir.display(),
                "Plugin name shadows a host package, skipping plugin"
            );
            continue;
        }

        let configured = config
            .plugin(name.as_str())
            .map(|p| p.secrets.clone())
            .unwrap_or_default();
        let secrets = plugin.manifest.select_secrets(&configured);
        let descriptors = plugin.manifest.descriptors(&plugin.dir, &secrets);

        if let Some(taken) = descriptors.iter().find(|d| registry.contains(&d.id)) {
            warn!(
                plugin = %name,
                protocol = %taken.id,
                path = %plugin.dir.display(),
                "Protocol already registered, skipping plugin"
            );
            continue;
        }
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use caduceus_config::PluginSection;
    use caduceus_core::{BoundEvent, EventType, ProtocolId};
    use caduceus_sandbox::AllowListBuilder;
    use serde_json::{Value, json};

    use super::*;
    use crate::error::ProtocolResult;
    use crate::protocol::{Protocol, ProtocolContext, ProtocolFactory};

    struct Log;

    impl Protocol for Log {
        fn compute(&mut self) -> ProtocolResult<Vec<Value>> {
            Ok(vec![json!({"type": "LOG", "payload": {"from": "native"}})])
        }
    }

    struct LogFactory;

    impl ProtocolFactory for LogFactory {
        fn instantiate(
            &self,
            _event: BoundEvent,
            _ctx: ProtocolContext,
        ) -> ProtocolResult<Box<dyn Protocol>> {
            Ok(Box::new(Log))
        }
    }

    fn native(plugin: &str, name: &str) -> ProtocolDescriptor {
        ProtocolDescriptor::native(
            ProtocolId::new(PluginName::new(plugin).unwrap(), name).unwrap(),
            [EventType::new("X").unwrap()],
            Arc::new(LogFactory),
        )
    }

    fn write_plugin(root: &Path, name: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Plugin.toml"),
            format!(
                "[package]\nname = \"{name}\"\nversion = \"0.1.0\"\nsecrets = [\"TOKEN\"]\n\n[[protocol]]\nname = \"p\"\nmodule = \"p.wasm\"\nresponds_to = [\"X\"]\n"
            ),
        )
        .unwrap();
    }

    fn config_with_plugins(root: &Path) -> Config {
        let mut config = Config::default();
        config.runtime.plugin_dirs = vec![root.to_path_buf()];
        config
    }

    #[test]
    fn test_missing_allowlist_is_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.runtime.allowlist_path = dir.path().join("missing.json");
        config.runtime.plugin_dirs = Vec::new();
        assert!(matches!(
            Runtime::start(&config),
            Err(StartupError::AllowList(_))
        ));
    }

    #[test]
    fn test_allowlist_loaded_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allowlist.json");
        std::fs::write(&path, AllowList::host_default().to_json_pretty().unwrap()).unwrap();
        let mut config = Config::default();
        config.runtime.allowlist_path = path;
        config.runtime.plugin_dirs = Vec::new();
        let runtime = Runtime::start(&config).unwrap();
        assert!(runtime.dispatcher().registry().is_empty());
    }

    #[test]
    fn test_duplicate_native_is_startup_error() {
        let result = RuntimeBuilder::new(Config::default())
            .with_allowlist(AllowListBuilder::new().build().unwrap())
            .with_protocol(native("core", "log"))
            .with_protocol(native("core", "log"))
            .build();
        assert!(matches!(result, Err(StartupError::Registry(_))));
    }

    #[test]
    fn test_native_first_then_discovered_sorted() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "zeta");
        write_plugin(root.path(), "alpha");

        let runtime = RuntimeBuilder::new(config_with_plugins(root.path()))
            .with_allowlist(AllowList::host_default())
            .with_protocol(native("core", "log"))
            .build()
            .unwrap();

        let registry = runtime.dispatcher().registry();
        let order: Vec<String> = registry
            .resolve(&EventType::new("X").unwrap())
            .iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(order, ["core:log", "alpha:p", "zeta:p"]);
    }

    #[test]
    fn test_disabled_plugin_skipped_and_secrets_filtered() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "alpha");
        write_plugin(root.path(), "beta");

        let mut config = config_with_plugins(root.path());
        config.plugins.insert(
            "alpha".into(),
            PluginSection {
                enabled: false,
                ..PluginSection::default()
            },
        );
        config.plugins.insert(
            "beta".into(),
            PluginSection {
                secrets: [
                    ("TOKEN".to_string(), "t".to_string()),
                    ("UNDECLARED".to_string(), "u".to_string()),
                ]
                .into(),
                ..PluginSection::default()
            },
        );

        let runtime = RuntimeBuilder::new(config)
            .with_allowlist(AllowList::host_default())
            .build()
            .unwrap();
        let registry = runtime.dispatcher().registry();
        assert_eq!(registry.len(), 1);
        let beta = &registry.descriptors()[0];
        assert_eq!(beta.plugin().as_str(), "beta");
        assert_eq!(beta.secrets.len(), 1);
        assert_eq!(beta.context().secret("TOKEN"), Some("t"));
    }

    #[test]
    fn test_plugin_colliding_with_native_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "alpha");

        let runtime = RuntimeBuilder::new(config_with_plugins(root.path()))
            .with_allowlist(AllowList::host_default())
            .with_protocol(native("alpha", "p"))
            .build()
            .unwrap();
        assert_eq!(runtime.dispatcher().registry().len(), 1);
    }

    #[test]
    fn test_native_plugin_shadowing_host_package_is_startup_error() {
        let result = RuntimeBuilder::new(Config::default())
            .with_allowlist(AllowListBuilder::new().allow_names("json", ["loads"]).build().unwrap())
            .with_protocol(native("json", "log"))
            .build();
        match result {
            Err(StartupError::ShadowedPackage { plugin, package }) => {
                assert_eq!(plugin.as_str(), "json");
                assert_eq!(package, "json");
            },
            other => panic!("unexpected result: {other:?}"),
        }

        let result = RuntimeBuilder::new(Config::default())
            .with_allowlist(AllowListBuilder::new().build().unwrap())
            .with_protocol(native("os", "log"))
            .build();
        assert!(matches!(result, Err(StartupError::ShadowedPackage { .. })));
    }

    #[test]
    fn test_discovered_plugin_shadowing_host_package_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "wasi_snapshot_preview1");
        write_plugin(root.path(), "caduceus");
        write_plugin(root.path(), "alpha");

        let runtime = RuntimeBuilder::new(config_with_plugins(root.path()))
            .with_allowlist(AllowListBuilder::host_default().with_wasi_preview1().build().unwrap())
            .build()
            .unwrap();
        let registry = runtime.dispatcher().registry();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.descriptors()[0].plugin().as_str(), "alpha");
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_plugins() {
        let root = tempfile::tempdir().unwrap();
        let runtime = RuntimeBuilder::new(config_with_plugins(root.path()))
            .with_allowlist(AllowList::host_default())
            .with_protocol(native("core", "log"))
            .build()
            .unwrap();
        assert_eq!(runtime.dispatcher().registry().len(), 1);

        write_plugin(root.path(), "late");
        assert_eq!(runtime.reload().unwrap(), 2);

        let effects = runtime
            .dispatch(Event::new(EventType::new("X").unwrap()))
            .await;
        // The native protocol still runs; `late` has no module on disk.
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].payload["from"], "native");
    }

    #[tokio::test]
    async fn test_unload_plugin_until_reload() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "alpha");
        let runtime = RuntimeBuilder::new(config_with_plugins(root.path()))
            .with_allowlist(AllowList::host_default())
            .with_protocol(native("core", "log"))
            .with_protocol(native("core", "audit"))
            .build()
            .unwrap();
        assert_eq!(runtime.dispatcher().registry().len(), 3);

        assert_eq!(runtime.unload_plugin(&PluginName::new("core").unwrap()), 2);
        let registry = runtime.dispatcher().registry();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.descriptors()[0].plugin().as_str(), "alpha");
        // `alpha` has no module on disk, so nothing is left to produce effects.
        assert!(
            runtime
                .dispatch(Event::new(EventType::new("X").unwrap()))
                .await
                .is_empty()
        );

        assert_eq!(runtime.unload_plugin(&PluginName::new("missing").unwrap()), 0);
        assert_eq!(runtime.reload().unwrap(), 3);
    }
}
