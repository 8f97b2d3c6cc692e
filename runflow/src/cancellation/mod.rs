//! Cooperative cancellation and in-flight run tracking.
//!
//! This module provides:
//! - CancellationToken for cooperative cancellation
//! - RunRegistry mapping run ids to their live handles

mod registry;
mod token;

pub use registry::{RunGuard, RunHandle, RunRegistry};
pub use token::CancellationToken;
