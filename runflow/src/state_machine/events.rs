//! Events that drive run and stage-run transitions.

use serde::{Deserialize, Serialize};

/// A lifecycle event applied to a run or a stage-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The coordinator begins work.
    Start,
    /// The unit of work succeeded.
    Complete,
    /// The unit of work failed with a reason.
    Fail(String),
    /// An external cancellation request.
    Cancel,
}

impl LifecycleEvent {
    /// String form used in logs and errors.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Extract error message if this is a failure event.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }
}
