//! Run coordination.
//!
//! This module provides:
//! - The sequential run coordinator and the cancel path
//! - Run-level resource aggregation
//! - Per-pipeline run statistics

mod metrics;
mod run_coordinator;
mod statistics;

pub use metrics::RunMetrics;
pub use run_coordinator::{RunCoordinator, RunExit};
pub use statistics::RunStatistics;
