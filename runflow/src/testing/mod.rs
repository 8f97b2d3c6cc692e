//! Testing utilities for runflow engines.
//!
//! This module provides:
//! - A scripted stage executor with per-order outcomes
//! - Pipeline definition fixtures
//! - A pre-wired engine harness

mod fixtures;
mod mocks;

pub use fixtures::{linear_definition, TestHarness};
pub use mocks::ScriptedExecutor;
