//! Legal transition table and the `Lifecycle` trait.

use super::{LifecycleEvent, RunStatus};
use crate::errors::TransitionError;

/// Returns the state reached by applying `event` in `from`, or `None` if the
/// transition is illegal.
///
/// ```text
/// PENDING  --start-->    RUNNING
/// RUNNING  --complete--> COMPLETED
/// RUNNING  --fail-->     FAILED
/// PENDING|RUNNING --cancel--> CANCELLED
/// ```
///
/// Terminal states accept nothing.
#[must_use]
pub const fn next_status(from: RunStatus, event: &LifecycleEvent) -> Option<RunStatus> {
    match (from, event) {
        (RunStatus::Pending, LifecycleEvent::Start) => Some(RunStatus::Running),
        (RunStatus::Running, LifecycleEvent::Complete) => Some(RunStatus::Completed),
        (RunStatus::Running, LifecycleEvent::Fail(_)) => Some(RunStatus::Failed),
        (RunStatus::Pending | RunStatus::Running, LifecycleEvent::Cancel) => {
            Some(RunStatus::Cancelled)
        }
        _ => None,
    }
}

/// A record whose status follows the run state machine.
pub trait Lifecycle {
    /// Entity name used in transition errors.
    const ENTITY: &'static str;

    /// Current status.
    fn status(&self) -> RunStatus;

    /// Overwrites the status. Only called through [`Lifecycle::fire`].
    fn set_status(&mut self, status: RunStatus);

    /// Applies an event, returning the new status.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] and leaves the record untouched if the
    /// event is not legal in the current state.
    fn fire(&mut self, event: &LifecycleEvent) -> Result<RunStatus, TransitionError> {
        let from = self.status();
        let next =
            next_status(from, event).ok_or_else(|| TransitionError::new(Self::ENTITY, from, event))?;
        self.set_status(next);
        Ok(next)
    }
}
