//! Shared utilities for configurator integration tests.
//!
//! - `TestHarness` for isolated configuration/runtime directories and stub
//!   collaborators
//! - Builders for configuration resources

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{run_cycles, TestHarness};
