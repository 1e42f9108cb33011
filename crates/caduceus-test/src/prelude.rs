//! Prelude module - commonly used test utilities.
//!
//! Use `use caduceus_test::prelude::*;` to import everything a dispatch test
//! usually needs.

pub use crate::fixtures::*;
pub use crate::harness::*;
pub use crate::mocks::*;
pub use crate::wasm::{GuestModule, effects_output};
