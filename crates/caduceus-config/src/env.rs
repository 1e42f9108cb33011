//! Environment variable fallback.
//!
//! Env vars are **fallback**, not override: they are only applied to fields
//! no config file set. Defaults do not count as set.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: ValueKind,
}

#[derive(Clone, Copy)]
enum ValueKind {
    String,
    Integer,
    /// A platform path list (`:`-separated on Unix).
    PathList,
}

/// All supported `CADUCEUS_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "CADUCEUS_ALLOWLIST",
        field_path: "runtime.allowlist_path",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "CADUCEUS_PLUGIN_DIRS",
        field_path: "runtime.plugin_dirs",
        kind: ValueKind::PathList,
    },
    EnvMapping {
        var_name: "CADUCEUS_HANDLER_TIMEOUT_MS",
        field_path: "runtime.handler_timeout_ms",
        kind: ValueKind::Integer,
    },
    EnvMapping {
        var_name: "CADUCEUS_LOG_LEVEL",
        field_path: "logging.level",
        kind: ValueKind::String,
    },
];

/// Apply environment variable fallbacks to fields that were **not** set by
/// any config file layer.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if sources
            .get(mapping.field_path)
            .is_some_and(ConfigLayer::is_file)
        {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );

            set_field(merged, mapping.field_path, coerce(mapping.kind, val));
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Coerce a string env var value to the TOML type of its field. Values that
/// do not parse are passed through as strings so deserialization reports
/// the field.
fn coerce(kind: ValueKind, val: &str) -> toml::Value {
    match kind {
        ValueKind::Integer => val
            .trim()
            .parse::<i64>()
            .map_or_else(|_| toml::Value::String(val.to_owned()), toml::Value::Integer),
        ValueKind::PathList => toml::Value::Array(
            std::env::split_paths(val)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p: PathBuf| toml::Value::String(p.to_string_lossy().into_owned()))
                .collect(),
        ),
        ValueKind::String => toml::Value::String(val.to_owned()),
    }
}

/// Set a dotted field in the TOML tree, creating intermediate tables.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let (parents, leaf) = path.rsplit_once('.').unwrap_or(("", path));

    let mut current = root;
    for segment in parents.split('.').filter(|s| !s.is_empty()) {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}
