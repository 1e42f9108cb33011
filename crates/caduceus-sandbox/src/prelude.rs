//! Prelude module - commonly used types for convenient import.
//!
//! Use `use caduceus_sandbox::prelude::*;` to import all essential types.

pub use crate::{SandboxError, SandboxResult};

pub use crate::{AllowList, AllowListBuilder, ModuleRule};

pub use crate::{GuardContext, ImportDenied, ImportGuard, ImportRequest};

pub use crate::{ModuleScan, scan_module};
