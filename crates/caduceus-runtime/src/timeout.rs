//! Per-handler wall-clock limits.

use std::collections::HashMap;
use std::time::Duration;

use caduceus_config::Config;
use caduceus_core::PluginName;
use tracing::warn;

use crate::descriptor::ProtocolDescriptor;

/// Decides how long one handler invocation may run.
pub trait TimeoutPolicy: Send + Sync {
    /// The limit for `descriptor`, or `None` for no limit.
    fn timeout_for(&self, descriptor: &ProtocolDescriptor) -> Option<Duration>;
}

/// Handlers run without a limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTimeout;

impl TimeoutPolicy for NoTimeout {
    fn timeout_for(&self, _descriptor: &ProtocolDescriptor) -> Option<Duration> {
        None
    }
}

/// The same limit for every handler.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeout(pub Duration);

impl TimeoutPolicy for FixedTimeout {
    fn timeout_for(&self, _descriptor: &ProtocolDescriptor) -> Option<Duration> {
        Some(self.0)
    }
}

/// A default limit with per-plugin overrides.
#[derive(Debug, Clone, Default)]
pub struct PluginTimeouts {
    default: Option<Duration>,
    overrides: HashMap<PluginName, Option<Duration>>,
}

impl PluginTimeouts {
    /// Create a policy with the given default.
    #[must_use]
    pub fn new(default: Option<Duration>) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Override the limit for one plugin. `None` removes the limit.
    #[must_use]
    pub fn with_override(mut self, plugin: PluginName, timeout: Option<Duration>) -> Self {
        self.overrides.insert(plugin, timeout);
        self
    }

    /// Build from `[runtime] handler_timeout_ms` and
    /// `[plugins.<name>] timeout_ms`. A value of `0` means no limit.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut policy = Self::new(config.runtime.handler_timeout());
        for (name, section) in &config.plugins {
            let Some(ms) = section.timeout_ms else {
                continue;
            };
            match PluginName::new(name.as_str()) {
                Ok(plugin) => {
                    policy = policy
                        .with_override(plugin, (ms > 0).then(|| Duration::from_millis(ms)));
                },
                Err(e) => warn!(plugin = %name, error = %e, "Ignoring timeout override"),
            }
        }
        policy
    }
}

impl TimeoutPolicy for PluginTimeouts {
    fn timeout_for(&self, descriptor: &ProtocolDescriptor) -> Option<Duration> {
        self.overrides
            .get(descriptor.plugin())
            .copied()
            .unwrap_or(self.default)
    }
}
