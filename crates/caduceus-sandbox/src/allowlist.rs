//! The import allow-list artifact.
//!
//! The allow-list is produced by a build step (`caduceus-runner allowlist`),
//! written as JSON, and loaded once at startup. After loading it is shared
//! read-only behind an `Arc`; nothing in the runtime mutates it.
//!
//! ```json
//! {
//!   "version": 1,
//!   "modules": {
//!     "extism:host/env": "*",
//!     "extism:host/user": ["caduceus_log", "caduceus_secret"],
//!     "caduceus.effects": "*"
//!   }
//! }
//! ```
//!
//! A module is allowed when it is listed or is a dotted descendant of a
//! listed module. Names imported from a module are checked against the
//! closest listed ancestor.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SandboxError, SandboxResult};
use crate::host::{
    EXTISM_KERNEL_MODULE, HOST_FUNCTIONS, HOST_USER_MODULE, SDK_MODULES, WASI_PREVIEW1_FUNCTIONS,
    WASI_PREVIEW1_MODULE,
};

/// Artifact format version this runtime reads and writes.
pub const ALLOWLIST_VERSION: u32 = 1;

const ANY_NAME: &str = "*";

/// What may be imported from an allowed module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRule {
    /// Any name.
    Any,
    /// Only the listed names.
    Names(BTreeSet<String>),
}

impl ModuleRule {
    /// Whether `name` may be imported under this rule.
    #[must_use]
    pub fn permits(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Names(names) => names.contains(name) || names.contains(ANY_NAME),
        }
    }
}

impl Serialize for ModuleRule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Any => serializer.serialize_str(ANY_NAME),
            Self::Names(names) => names.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ModuleRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Wildcard(String),
            Names(BTreeSet<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Wildcard(s) if s == ANY_NAME => Ok(Self::Any),
            Raw::Wildcard(s) => Err(serde::de::Error::custom(format!(
                "expected \"*\" or an array of names, found \"{s}\""
            ))),
            Raw::Names(names) => Ok(Self::Names(names)),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Artifact {
    version: u64,
    modules: BTreeMap<String, ModuleRule>,
}

/// The set of modules plugin code may import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    modules: BTreeMap<String, ModuleRule>,
}

impl AllowList {
    /// Load the artifact from disk.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or unreadable, is not a valid artifact,
    /// declares another version, or lists a malformed module name.
    pub fn load_from(path: impl AsRef<Path>) -> SandboxResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SandboxError::AllowListNotFound(path.to_path_buf())
            } else {
                SandboxError::AllowListRead {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let list = Self::from_json(&text).map_err(|e| match e {
            SandboxError::AllowListParse(msg) => {
                SandboxError::AllowListParse(format!("{}: {msg}", path.display()))
            },
            other => other,
        })?;

        info!(
            path = %path.display(),
            modules = list.len(),
            "Loaded import allow-list"
        );
        Ok(list)
    }

    /// Parse the artifact from JSON text.
    ///
    /// # Errors
    ///
    /// Same as [`AllowList::load_from`], minus the I/O cases.
    pub fn from_json(text: &str) -> SandboxResult<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| SandboxError::AllowListParse(e.to_string()))?;

        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| SandboxError::AllowListParse("missing numeric 'version'".into()))?;
        if version != u64::from(ALLOWLIST_VERSION) {
            return Err(SandboxError::UnsupportedVersion {
                found: version,
                expected: ALLOWLIST_VERSION,
            });
        }

        let artifact: Artifact =
            serde_json::from_value(value).map_err(|e| SandboxError::AllowListParse(e.to_string()))?;
        for module in artifact.modules.keys() {
            validate_module_name(module)?;
        }
        Ok(Self {
            modules: artifact.modules,
        })
    }

    /// Serialize to the artifact format.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::AllowListParse`] if serialization fails.
    pub fn to_json_pretty(&self) -> SandboxResult<String> {
        let artifact = Artifact {
            version: u64::from(ALLOWLIST_VERSION),
            modules: self.modules.clone(),
        };
        serde_json::to_string_pretty(&artifact).map_err(|e| SandboxError::AllowListParse(e.to_string()))
    }

    /// The host modules the runtime itself provides: the extism kernel, the
    /// runtime's host functions and the SDK packages.
    #[must_use]
    pub fn host_default() -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(EXTISM_KERNEL_MODULE.to_string(), ModuleRule::Any);
        modules.insert(
            HOST_USER_MODULE.to_string(),
            ModuleRule::Names(HOST_FUNCTIONS.iter().map(ToString::to_string).collect()),
        );
        for sdk in SDK_MODULES {
            modules.insert((*sdk).to_string(), ModuleRule::Any);
        }
        Self { modules }
    }

    /// The closest listed ancestor of `module` (or `module` itself) and its
    /// rule.
    #[must_use]
    pub fn closest_rule<'a>(&'a self, module: &'a str) -> Option<(&'a str, &'a ModuleRule)> {
        let mut candidate = module;
        loop {
            if let Some(rule) = self.modules.get(candidate) {
                return Some((candidate, rule));
            }
            candidate = candidate.rsplit_once('.')?.0;
        }
    }

    /// Whether `module` may be imported at all.
    #[must_use]
    pub fn is_allowed(&self, module: &str) -> bool {
        self.closest_rule(module).is_some()
    }

    /// Whether `name` may be imported from `module`.
    #[must_use]
    pub fn is_name_allowed(&self, module: &str, name: &str) -> bool {
        self.closest_rule(module)
            .is_some_and(|(_, rule)| rule.permits(name))
    }

    /// Listed modules and their rules, in name order.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &ModuleRule)> {
        self.modules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of listed modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether nothing is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Module names are dotted paths or URI-like host namespaces. Reject the
/// shapes that could never match an import.
fn validate_module_name(name: &str) -> SandboxResult<()> {
    let valid = !name.is_empty()
        && !name.chars().any(char::is_whitespace)
        && name.split('.').all(|segment| !segment.is_empty());
    if valid {
        Ok(())
    } else {
        Err(SandboxError::InvalidModuleName(name.to_string()))
    }
}

/// Programmatic construction of an [`AllowList`].
#[derive(Debug, Clone, Default)]
pub struct AllowListBuilder {
    modules: BTreeMap<String, ModuleRule>,
}

impl AllowListBuilder {
    /// Start from an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from [`AllowList::host_default`].
    #[must_use]
    pub fn host_default() -> Self {
        Self {
            modules: AllowList::host_default().modules,
        }
    }

    /// Allow every name in `module`.
    #[must_use]
    pub fn allow_module(mut self, module: impl Into<String>) -> Self {
        self.modules.insert(module.into(), ModuleRule::Any);
        self
    }

    /// Allow the given names in `module`. Adds to names already allowed; a
    /// module already open to any name stays open.
    #[must_use]
    pub fn allow_names<I, S>(mut self, module: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .modules
            .entry(module.into())
            .or_insert_with(|| ModuleRule::Names(BTreeSet::new()));
        if let ModuleRule::Names(existing) = entry {
            existing.extend(names.into_iter().map(Into::into));
        }
        self
    }

    /// Allow the WASI preview 1 functions plugins built for `wasm32-wasip1`
    /// typically import.
    #[must_use]
    pub fn with_wasi_preview1(self) -> Self {
        self.allow_names(WASI_PREVIEW1_MODULE, WASI_PREVIEW1_FUNCTIONS.iter().copied())
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidModuleName`] for a malformed module.
    pub fn build(self) -> SandboxResult<AllowList> {
        for module in self.modules.keys() {
            validate_module_name(module)?;
        }
        debug!(modules = self.modules.len(), "Built import allow-list");
        Ok(AllowList {
            modules: self.modules,
        })
    }
}
