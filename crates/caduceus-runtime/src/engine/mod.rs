//! Execution engines for non-native protocols.

pub mod wasm;

pub use wasm::WasmEngine;
