//! Error types for the runflow engine.
//!
//! The taxonomy mirrors what the API layer needs to render: validation
//! failures (caller's fault, nothing written), missing records, storage
//! faults, and illegal lifecycle transitions. Stage execution failures are
//! not errors here; they are recorded on the run itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::state_machine::{LifecycleEvent, RunStatus};

/// The main error type for runflow operations.
#[derive(Debug, Error)]
pub enum RunflowError {
    /// A pipeline or stage definition was rejected.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A referenced record does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The persistence layer failed; the current commit was rolled back.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// A lifecycle transition was attempted from a state that forbids it.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// Engine configuration was rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RunflowError {
    /// Returns the taxonomy tag that may cross the API boundary.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Transition(_) | Self::Config(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Coarse error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad pipeline or stage definition.
    Validation,
    /// Unknown pipeline, run or stage-run.
    NotFound,
    /// Persistence failure.
    Storage,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// The HTTP status the API layer should answer with.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Validation => 422,
            Self::NotFound => 404,
            Self::Storage | Self::Internal => 500,
        }
    }

    /// Stable tag for response bodies.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::NotFound => "not_found",
            Self::Storage => "storage_error",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised when a pipeline definition fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// Human-readable reason.
    pub message: String,
    /// Names of the stages involved, if any.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Adds one stage to the involved set.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stages.push(stage.into());
        self
    }
}

/// A referenced record is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotFoundError {
    /// No pipeline with this id.
    #[error("Pipeline with id {0} not found")]
    Pipeline(Uuid),
    /// No run with this id (under the given pipeline).
    #[error("Pipeline run with id {0} not found")]
    Run(Uuid),
    /// No stage-run with this id.
    #[error("Stage run with id {0} not found")]
    StageRun(Uuid),
}

/// Persistence failures. A failed call never leaves a partial write behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Reading from the store failed.
    #[error("Storage read failed: {0}")]
    Read(String),
    /// Writing to the store failed and was rolled back.
    #[error("Storage write failed: {0}")]
    Write(String),
    /// The write referenced records in an inconsistent way.
    #[error("Storage conflict: {0}")]
    Conflict(String),
}

impl StorageError {
    /// Creates a write error.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write(message.into())
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

/// Raised when a lifecycle event is not legal in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal transition for {entity}: cannot apply '{event}' in state {from}")]
pub struct TransitionError {
    /// Which kind of record was being transitioned ("run", "stage_run").
    pub entity: &'static str,
    /// The state the record was in.
    pub from: RunStatus,
    /// The rejected event.
    pub event: &'static str,
}

impl TransitionError {
    /// Creates a new transition error.
    #[must_use]
    pub fn new(entity: &'static str, from: RunStatus, event: &LifecycleEvent) -> Self {
        Self {
            entity,
            from,
            event: event.event_type(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RunflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_builder() {
        let err = PipelineValidationError::new("Duplicate stage orders found")
            .with_stage("train")
            .with_stage("eval");

        assert_eq!(err.to_string(), "Duplicate stage orders found");
        assert_eq!(err.stages, vec!["train".to_string(), "eval".to_string()]);
    }

    #[test]
    fn test_error_kind_mapping() {
        let validation: RunflowError = PipelineValidationError::new("bad").into();
        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert_eq!(validation.kind().status_code(), 422);

        let missing: RunflowError = NotFoundError::Pipeline(Uuid::nil()).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(missing.kind().status_code(), 404);

        let storage: RunflowError = StorageError::write("disk full").into();
        assert_eq!(storage.kind(), ErrorKind::Storage);
        assert_eq!(storage.kind().as_str(), "storage_error");
    }

    #[test]
    fn test_not_found_message() {
        let id = Uuid::nil();
        let err = NotFoundError::Run(id);
        assert_eq!(
            err.to_string(),
            format!("Pipeline run with id {id} not found")
        );
    }

    #[test]
    fn test_transition_error_message() {
        let err = TransitionError::new("run", RunStatus::Completed, &LifecycleEvent::Start);
        assert!(err.to_string().contains("cannot apply 'start' in state COMPLETED"));
    }
}
