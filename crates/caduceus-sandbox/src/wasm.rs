//! Import extraction from plugin WASM binaries.

use std::collections::{BTreeMap, BTreeSet};

use wasmparser::{Encoding, ExternalKind, Parser, Payload};

use crate::error::{SandboxError, SandboxResult};
use crate::guard::ImportRequest;

/// What a WASM module imports and exports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleScan {
    /// Imports grouped by module, in module name order.
    pub imports: Vec<ImportRequest>,
    /// Names of exported functions.
    pub exported_functions: BTreeSet<String>,
}

impl ModuleScan {
    /// Whether the module exports a function called `name`.
    #[must_use]
    pub fn exports_function(&self, name: &str) -> bool {
        self.exported_functions.contains(name)
    }
}

/// Read the import and export sections of a core WASM module.
///
/// All import kinds (functions, memories, tables, globals, tags) are
/// reported, since each one binds to something the host provides.
///
/// # Errors
///
/// Returns [`SandboxError::InvalidWasm`] for empty input, a component
/// binary, or a module that fails to parse.
pub fn scan_module(bytes: &[u8]) -> SandboxResult<ModuleScan> {
    if bytes.is_empty() {
        return Err(SandboxError::InvalidWasm("empty module".into()));
    }

    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut exported_functions = BTreeSet::new();

    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload.map_err(|e| SandboxError::InvalidWasm(e.to_string()))?;
        match payload {
            Payload::Version {
                encoding: Encoding::Component,
                ..
            } => {
                return Err(SandboxError::InvalidWasm(
                    "component binaries are not supported".into(),
                ));
            },
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.map_err(|e| {
                        SandboxError::InvalidWasm(format!("failed to read import: {e}"))
                    })?;
                    grouped
                        .entry(import.module.to_string())
                        .or_default()
                        .insert(import.name.to_string());
                }
            },
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.map_err(|e| {
                        SandboxError::InvalidWasm(format!("failed to read export: {e}"))
                    })?;
                    if export.kind == ExternalKind::Func {
                        exported_functions.insert(export.name.to_string());
                    }
                }
            },
            _ => {},
        }
    }

    let imports = grouped
        .into_iter()
        .map(|(module, names)| ImportRequest::new(module).with_names(names))
        .collect();

    Ok(ModuleScan {
        imports,
        exported_functions,
    })
}
