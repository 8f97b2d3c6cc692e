//! Run and stage-run state machine.
//!
//! Runs and stage-runs share one five-state lifecycle
//! (`PENDING → RUNNING → COMPLETED | FAILED | CANCELLED`). Stage definitions
//! and pipelines carry coarser statuses that mirror their latest run.

mod events;
mod states;
mod transitions;

pub use events::LifecycleEvent;
pub use states::{PipelineStatus, RunStatus, StageStatus};
pub use transitions::{next_status, Lifecycle};
