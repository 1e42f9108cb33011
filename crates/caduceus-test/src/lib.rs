//! Caduceus Test - Shared test utilities for the Caduceus runtime.
//!
//! This crate provides protocol fixtures, a recording diagnostic sink, WASM
//! guest builders and harness helpers for use as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! caduceus-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use caduceus_test::prelude::*;
//!
//! #[tokio::test]
//! async fn failing_handler_is_isolated() {
//!     let (dispatcher, sink) = DispatchHarness::new()
//!         .with_protocol(static_protocol("a", "t1", ["X"], vec![log_effect("t1")]))
//!         .with_protocol(failing_protocol("b", "t2", ["X"], "boom"))
//!         .build();
//!
//!     let effects = dispatcher.dispatch(test_event("X")).await;
//!     assert_eq!(effects.len(), 1);
//!     assert_eq!(sink.len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;
pub mod wasm;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
pub use wasm::*;
