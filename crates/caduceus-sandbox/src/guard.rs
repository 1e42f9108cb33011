//! The import guard.
//!
//! Every protocol's imports pass through [`ImportGuard::check`] before any of
//! its code runs. The guard holds the allow-list read-only; plugins have no
//! path to modify it.
//!
//! Native protocols may import their own package without an allow-list
//! entry. WASM imports name host namespaces, never plugin code, so the WASM
//! path checks every import against the list.

use std::fmt;
use std::sync::Arc;

use caduceus_core::{PluginName, ProtocolId};
use tracing::warn;

use crate::allowlist::AllowList;
use crate::host::RESERVED_PACKAGES;

/// One module a protocol imports, and the names it takes from it.
///
/// An empty `names` list means the module is imported as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// Fully qualified module name.
    pub module: String,
    /// Names imported from the module.
    pub names: Vec<String>,
}

impl ImportRequest {
    /// Import a whole module.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            names: Vec::new(),
        }
    }

    /// Add a name imported from the module.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Add several names imported from the module.
    #[must_use]
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Identity of the protocol whose imports are being checked.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    /// Owning plugin.
    pub plugin: &'a PluginName,
    /// Protocol being loaded.
    pub protocol: &'a ProtocolId,
    /// Whether imports of the plugin's own package skip the allow-list.
    pub own_package: bool,
}

impl<'a> GuardContext<'a> {
    /// Create a context in which every import is checked against the
    /// allow-list.
    #[must_use]
    pub fn new(plugin: &'a PluginName, protocol: &'a ProtocolId) -> Self {
        Self {
            plugin,
            protocol,
            own_package: false,
        }
    }

    /// Let the plugin import its own package. Has no effect for a plugin
    /// whose name shadows a host package (see
    /// [`ImportGuard::shadowed_package`]).
    #[must_use]
    pub fn with_own_package(mut self) -> Self {
        self.own_package = true;
        self
    }
}

/// A refused import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDenied {
    /// Plugin that asked for the import.
    pub plugin: PluginName,
    /// Protocol that asked for the import.
    pub protocol: ProtocolId,
    /// Requested module.
    pub module: String,
    /// Requested name within the module, when the module itself was allowed.
    pub name: Option<String>,
}

impl ImportDenied {
    /// The denied qualified name: `module` or `module.name`.
    #[must_use]
    pub fn requested(&self) -> String {
        match &self.name {
            Some(name) => format!("{}.{name}", self.module),
            None => self.module.clone(),
        }
    }
}

impl fmt::Display for ImportDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "plugin '{}' may not import '{}'",
            self.plugin,
            self.requested()
        )
    }
}

impl std::error::Error for ImportDenied {}

/// Checks imports against the allow-list.
#[derive(Debug, Clone)]
pub struct ImportGuard {
    allowlist: Arc<AllowList>,
}

impl ImportGuard {
    /// Create a guard over a loaded allow-list.
    #[must_use]
    pub fn new(allowlist: Arc<AllowList>) -> Self {
        Self { allowlist }
    }

    /// The allow-list in force.
    #[must_use]
    pub fn allowlist(&self) -> &AllowList {
        &self.allowlist
    }

    /// Whether `module` is on the allow-list. Pure lookup; does not apply
    /// the own-package rule.
    #[must_use]
    pub fn is_allowed(&self, module: &str) -> bool {
        self.allowlist.is_allowed(module)
    }

    /// The host package a plugin named `plugin` would shadow, if any: a
    /// reserved package name or the root segment of an allow-list entry.
    #[must_use]
    pub fn shadowed_package(&self, plugin: &PluginName) -> Option<String> {
        let name = plugin.as_str();
        if RESERVED_PACKAGES.contains(&name) {
            return Some(name.to_string());
        }
        self.allowlist
            .modules()
            .map(|(module, _)| module)
            .find(|module| module.split('.').next() == Some(name))
            .map(ToString::to_string)
    }

    /// Check one import request.
    ///
    /// When the context allows it, a plugin may import from its own package
    /// unless its name shadows a host package. Otherwise the module must be
    /// allowed and so must every name taken from it.
    ///
    /// # Errors
    ///
    /// Returns [`ImportDenied`] for the first refused module or name. The
    /// denial is also logged at `warn`.
    pub fn check(&self, request: &ImportRequest, ctx: &GuardContext<'_>) -> Result<(), ImportDenied> {
        if ctx.own_package
            && is_own_package(ctx.plugin, &request.module)
            && self.shadowed_package(ctx.plugin).is_none()
        {
            return Ok(());
        }

        if !self.allowlist.is_allowed(&request.module) {
            return Err(Self::deny(ctx, &request.module, None));
        }

        for name in &request.names {
            if !self.allowlist.is_name_allowed(&request.module, name) {
                return Err(Self::deny(ctx, &request.module, Some(name)));
            }
        }

        Ok(())
    }

    /// Check every request, stopping at the first denial.
    ///
    /// # Errors
    ///
    /// See [`ImportGuard::check`].
    pub fn check_all(
        &self,
        requests: &[ImportRequest],
        ctx: &GuardContext<'_>,
    ) -> Result<(), ImportDenied> {
        requests.iter().try_for_each(|req| self.check(req, ctx))
    }

    fn deny(ctx: &GuardContext<'_>, module: &str, name: Option<&str>) -> ImportDenied {
        let denied = ImportDenied {
            plugin: ctx.plugin.clone(),
            protocol: ctx.protocol.clone(),
            module: module.to_string(),
            name: name.map(ToString::to_string),
        };
        warn!(
            plugin = %denied.plugin,
            protocol = %denied.protocol,
            requested = %denied.requested(),
            "Import denied"
        );
        denied
    }
}

fn is_own_package(plugin: &PluginName, module: &str) -> bool {
    module.split('.').next() == Some(plugin.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlist::AllowListBuilder;

    fn guard() -> ImportGuard {
        let list = AllowListBuilder::new()
            .allow_module("caduceus.effects")
            .allow_names("json", ["loads"])
            .build()
            .unwrap();
        ImportGuard::new(Arc::new(list))
    }

    fn ids() -> (PluginName, ProtocolId) {
        let plugin = PluginName::new("banner").unwrap();
        let protocol = ProtocolId::new(plugin.clone(), "manager").unwrap();
        (plugin, protocol)
    }

    #[test]
    fn test_allowed_module_and_name() {
        let (plugin, protocol) = ids();
        let ctx = GuardContext::new(&plugin, &protocol);
        let guard = guard();
        assert!(guard.check(&ImportRequest::new("caduceus.effects"), &ctx).is_ok());
        assert!(
            guard
                .check(&ImportRequest::new("json").with_name("loads"), &ctx)
                .is_ok()
        );
    }

    #[test]
    fn test_denied_module_names_module() {
        let (plugin, protocol) = ids();
        let ctx = GuardContext::new(&plugin, &protocol);
        let err = guard()
            .check(&ImportRequest::new("os.system_exec"), &ctx)
            .unwrap_err();
        assert_eq!(err.requested(), "os.system_exec");
        assert_eq!(err.plugin, plugin);
        assert_eq!(err.protocol, protocol);
        assert!(err.to_string().contains("os.system_exec"));
    }

    #[test]
    fn test_denied_name_is_qualified() {
        let (plugin, protocol) = ids();
        let ctx = GuardContext::new(&plugin, &protocol);
        let err = guard()
            .check(&ImportRequest::new("json").with_names(["loads", "dumps"]), &ctx)
            .unwrap_err();
        assert_eq!(err.requested(), "json.dumps");
    }

    #[test]
    fn test_own_package_allowed_when_granted() {
        let (plugin, protocol) = ids();
        let ctx = GuardContext::new(&plugin, &protocol).with_own_package();
        let guard = guard();
        assert!(
            guard
                .check(&ImportRequest::new("banner.helpers").with_name("x"), &ctx)
                .is_ok()
        );
        assert!(guard.check(&ImportRequest::new("banner"), &ctx).is_ok());
        assert!(guard.check(&ImportRequest::new("banner_other"), &ctx).is_err());
        assert!(!guard.is_allowed("banner.helpers"));
    }

    #[test]
    fn test_own_package_not_granted_by_default() {
        let (plugin, protocol) = ids();
        let ctx = GuardContext::new(&plugin, &protocol);
        let err = guard()
            .check(&ImportRequest::new("banner.helpers"), &ctx)
            .unwrap_err();
        assert_eq!(err.requested(), "banner.helpers");
    }

    #[test]
    fn test_plugin_named_after_wasi_gets_no_extra_wasi_calls() {
        let list = AllowListBuilder::host_default()
            .with_wasi_preview1()
            .build()
            .unwrap();
        let guard = ImportGuard::new(Arc::new(list));
        let plugin = PluginName::new("wasi_snapshot_preview1").unwrap();
        let protocol = ProtocolId::new(plugin.clone(), "p").unwrap();
        let request =
            ImportRequest::new("wasi_snapshot_preview1").with_names(["path_open", "sock_accept"]);

        let err = guard
            .check(&request, &GuardContext::new(&plugin, &protocol))
            .unwrap_err();
        assert_eq!(err.requested(), "wasi_snapshot_preview1.path_open");

        let err = guard
            .check(&request, &GuardContext::new(&plugin, &protocol).with_own_package())
            .unwrap_err();
        assert_eq!(err.requested(), "wasi_snapshot_preview1.path_open");

        let allowed = ImportRequest::new("wasi_snapshot_preview1").with_name("fd_write");
        assert!(guard.check(&allowed, &GuardContext::new(&plugin, &protocol)).is_ok());
    }

    #[test]
    fn test_plugin_named_after_system_package_cannot_reach_it() {
        let list = AllowListBuilder::host_default()
            .with_wasi_preview1()
            .build()
            .unwrap();
        let guard = ImportGuard::new(Arc::new(list));
        let plugin = PluginName::new("os").unwrap();
        let protocol = ProtocolId::new(plugin.clone(), "p").unwrap();
        let ctx = GuardContext::new(&plugin, &protocol).with_own_package();

        let err = guard
            .check(&ImportRequest::new("os.system_exec"), &ctx)
            .unwrap_err();
        assert_eq!(err.requested(), "os.system_exec");
        assert_eq!(err.plugin.as_str(), "os");
    }

    #[test]
    fn test_shadowed_package() {
        let guard = guard();
        let name = |n: &str| PluginName::new(n).unwrap();
        assert_eq!(guard.shadowed_package(&name("json")).as_deref(), Some("json"));
        assert_eq!(
            guard.shadowed_package(&name("caduceus")).as_deref(),
            Some("caduceus")
        );
        assert_eq!(guard.shadowed_package(&name("sys")).as_deref(), Some("sys"));
        assert_eq!(guard.shadowed_package(&name("banner")), None);
        assert_eq!(guard.shadowed_package(&name("json_tools")), None);
    }

    #[test]
    fn test_check_all_stops_at_first_denial() {
        let (plugin, protocol) = ids();
        let ctx = GuardContext::new(&plugin, &protocol);
        let reqs = [
            ImportRequest::new("caduceus.effects"),
            ImportRequest::new("socket"),
            ImportRequest::new("os"),
        ];
        let err = guard().check_all(&reqs, &ctx).unwrap_err();
        assert_eq!(err.requested(), "socket");
    }
}
