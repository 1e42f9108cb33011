//! Validated identifiers for plugins and protocols.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Name of an installed plugin.
///
/// Plugin names double as the import package of the plugin's own code, so
/// they follow package naming: a lowercase ASCII letter followed by lowercase
/// letters, digits or underscores.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PluginName(String);

impl<'de> Deserialize<'de> for PluginName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl PluginName {
    /// Create a validated plugin name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPluginName`] if the name is not a valid
    /// package name.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if is_package_name(&name) {
            Ok(Self(name))
        } else {
            Err(CoreError::InvalidPluginName(name))
        }
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl fmt::Display for PluginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PluginName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for PluginName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Stable identity of a protocol: `"{plugin}:{protocol}"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolId {
    plugin: PluginName,
    name: String,
}

impl ProtocolId {
    /// Create a protocol identifier under `plugin`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidProtocolName`] if `name` is empty or
    /// contains anything other than ASCII alphanumerics, `_` or `-`.
    pub fn new(plugin: PluginName, name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CoreError::InvalidProtocolName(name));
        }
        Ok(Self { plugin, name })
    }

    /// The owning plugin.
    #[must_use]
    pub fn plugin(&self) -> &PluginName {
        &self.plugin
    }

    /// The protocol name within its plugin.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin, self.name)
    }
}

impl FromStr for ProtocolId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (plugin, name) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidProtocolName(s.to_string()))?;
        Self::new(PluginName::new(plugin)?, name)
    }
}

impl Serialize for ProtocolId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProtocolId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_name_validation() {
        assert!(PluginName::new("urgent_task_banner").is_ok());
        assert!(PluginName::new("p2").is_ok());
        assert!(PluginName::new("").is_err());
        assert!(PluginName::new("2fast").is_err());
        assert!(PluginName::new("Has-Caps").is_err());
        assert!(PluginName::new("has.dot").is_err());
    }

    #[test]
    fn test_plugin_name_deserialize_rejects_invalid() {
        let ok: PluginName = serde_json::from_str("\"banner\"").unwrap();
        assert_eq!(ok.as_str(), "banner");
        assert!(serde_json::from_str::<PluginName>("\"Banner\"").is_err());
    }

    #[test]
    fn test_protocol_id_display_and_parse() {
        let id = ProtocolId::new(PluginName::new("banner").unwrap(), "manager").unwrap();
        assert_eq!(id.to_string(), "banner:manager");

        let parsed: ProtocolId = "banner:manager".parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.plugin().as_str(), "banner");
        assert_eq!(parsed.name(), "manager");
    }

    #[test]
    fn test_protocol_id_rejects_bad_names() {
        assert!("no_separator".parse::<ProtocolId>().is_err());
        assert!("banner:".parse::<ProtocolId>().is_err());
        assert!("banner:has space".parse::<ProtocolId>().is_err());
    }

    #[test]
    fn test_protocol_id_serializes_as_string() {
        let id: ProtocolId = "a:b".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"a:b\"");
    }
}
