//! Lifecycle states for pipelines, stages, runs and stage-runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a run or a stage-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Created, not yet picked up by the coordinator.
    #[default]
    Pending,
    /// Work is in progress.
    Running,
    /// Work finished successfully.
    Completed,
    /// Work failed.
    Failed,
    /// Cancelled before finishing.
    Cancelled,
}

impl RunStatus {
    /// Returns true if no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true while a cancel request would still have an effect.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true if the record has been started at some point.
    #[must_use]
    pub const fn has_started(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid run status: {s}")),
        }
    }
}

/// Coarse pipeline status, mirroring its latest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    /// Never run, or latest run not started yet.
    #[default]
    Pending,
    /// Latest run is executing.
    Running,
    /// Latest run completed.
    Completed,
    /// Latest run failed.
    Failed,
    /// Latest run was cancelled.
    Cancelled,
}

impl From<RunStatus> for PipelineStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Pending => Self::Pending,
            RunStatus::Running => Self::Running,
            RunStatus::Completed => Self::Completed,
            RunStatus::Failed => Self::Failed,
            RunStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Status of a stage definition, as of its pipeline's latest run.
///
/// `Skipped` marks stages that were never reached because an earlier stage
/// failed or the run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    /// Not reached yet.
    #[default]
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Failed,
    /// Never reached, or abandoned by cancellation.
    Skipped,
}

impl StageStatus {
    /// Derives the logical stage status from a stage-run and its owning run.
    ///
    /// A stage-run still `PENDING` after its run went terminal was skipped.
    #[must_use]
    pub const fn from_stage_run(stage_run: RunStatus, run: RunStatus) -> Self {
        match stage_run {
            RunStatus::Pending if run.is_terminal() => Self::Skipped,
            RunStatus::Pending => Self::Pending,
            RunStatus::Running => Self::Running,
            RunStatus::Completed => Self::Completed,
            RunStatus::Failed => Self::Failed,
            RunStatus::Cancelled => Self::Skipped,
        }
    }

    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_terminal() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_run_status_cancellable() {
        assert!(RunStatus::Pending.is_cancellable());
        assert!(RunStatus::Running.is_cancellable());
        assert!(!RunStatus::Failed.is_cancellable());
    }

    #[test]
    fn test_run_status_round_trip_str() {
        assert_eq!(RunStatus::Running.to_string(), "RUNNING");
        assert_eq!("CANCELLED".parse::<RunStatus>().unwrap(), RunStatus::Cancelled);
        assert!("running".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_run_status_serde() {
        let json = serde_json::to_string(&RunStatus::Completed).unwrap();
        assert_eq!(json, r#""COMPLETED""#);
    }

    #[test]
    fn test_logical_stage_status() {
        assert_eq!(
            StageStatus::from_stage_run(RunStatus::Pending, RunStatus::Running),
            StageStatus::Pending
        );
        assert_eq!(
            StageStatus::from_stage_run(RunStatus::Pending, RunStatus::Failed),
            StageStatus::Skipped
        );
        assert_eq!(
            StageStatus::from_stage_run(RunStatus::Cancelled, RunStatus::Cancelled),
            StageStatus::Skipped
        );
        assert_eq!(
            StageStatus::from_stage_run(RunStatus::Failed, RunStatus::Failed),
            StageStatus::Failed
        );
    }

    #[test]
    fn test_pipeline_status_mirrors_run() {
        assert_eq!(PipelineStatus::from(RunStatus::Running), PipelineStatus::Running);
        assert_eq!(PipelineStatus::from(RunStatus::Cancelled), PipelineStatus::Cancelled);
        assert_eq!(PipelineStatus::default().to_string(), "PENDING");
    }
}
