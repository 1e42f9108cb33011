//! Caduceus Sandbox - Import restrictions for plugin code.
//!
//! This crate provides:
//! - The [`AllowList`] artifact: the modules (and names within them) that
//!   plugin code may import, loaded once at startup
//! - The [`ImportGuard`], which checks a protocol's imports against it
//! - WASM import extraction via [`scan_module`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use caduceus_core::{PluginName, ProtocolId};
//! use caduceus_sandbox::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let allowlist = AllowListBuilder::new()
//!     .allow_module("caduceus.effects")
//!     .build()?;
//! let guard = ImportGuard::new(Arc::new(allowlist));
//!
//! let plugin = PluginName::new("banner")?;
//! let protocol = ProtocolId::new(plugin.clone(), "manager")?;
//! let ctx = GuardContext::new(&plugin, &protocol);
//!
//! assert!(guard.check(&ImportRequest::new("caduceus.effects.banner"), &ctx).is_ok());
//! assert!(guard.check(&ImportRequest::new("os").with_name("system"), &ctx).is_err());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod allowlist;
pub mod error;
pub mod guard;
pub mod host;
pub mod wasm;

pub use allowlist::{ALLOWLIST_VERSION, AllowList, AllowListBuilder, ModuleRule};
pub use error::{SandboxError, SandboxResult};
pub use guard::{GuardContext, ImportDenied, ImportGuard, ImportRequest};
pub use wasm::{ModuleScan, scan_module};
