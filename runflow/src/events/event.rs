//! Typed lifecycle events emitted by the engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::TriggerType;

/// Something observable that happened to a pipeline, run or stage-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A pipeline passed validation and was stored.
    PipelineCreated {
        /// Pipeline id.
        pipeline_id: Uuid,
        /// Pipeline name.
        name: String,
        /// Number of stages.
        stage_count: usize,
    },
    /// A pipeline and its history were removed.
    PipelineDeleted {
        /// Pipeline id.
        pipeline_id: Uuid,
    },
    /// A run was created and handed to the coordinator.
    RunTriggered {
        /// Pipeline id.
        pipeline_id: Uuid,
        /// Run id.
        run_id: Uuid,
        /// How the run was triggered.
        trigger_type: TriggerType,
    },
    /// The coordinator began executing a run.
    RunStarted {
        /// Pipeline id.
        pipeline_id: Uuid,
        /// Run id.
        run_id: Uuid,
    },
    /// A stage-run began.
    StageStarted {
        /// Run id.
        run_id: Uuid,
        /// Stage-run id.
        stage_run_id: Uuid,
        /// Stage name.
        stage: String,
        /// Stage order.
        order: u32,
    },
    /// A stage-run completed.
    StageCompleted {
        /// Run id.
        run_id: Uuid,
        /// Stage-run id.
        stage_run_id: Uuid,
        /// Stage name.
        stage: String,
        /// Stage order.
        order: u32,
        /// Seconds spent.
        execution_time: f64,
    },
    /// A stage-run failed.
    StageFailed {
        /// Run id.
        run_id: Uuid,
        /// Stage-run id.
        stage_run_id: Uuid,
        /// Stage name.
        stage: String,
        /// Stage order.
        order: u32,
        /// Failure reason.
        error: String,
    },
    /// Every stage of a run completed.
    RunCompleted {
        /// Pipeline id.
        pipeline_id: Uuid,
        /// Run id.
        run_id: Uuid,
        /// Seconds spent.
        execution_time: Option<f64>,
    },
    /// A run stopped at a failed stage.
    RunFailed {
        /// Pipeline id.
        pipeline_id: Uuid,
        /// Run id.
        run_id: Uuid,
        /// Failure summary.
        error: String,
    },
    /// A run was cancelled.
    RunCancelled {
        /// Pipeline id.
        pipeline_id: Uuid,
        /// Run id.
        run_id: Uuid,
        /// Why it was cancelled.
        reason: String,
    },
}

impl EngineEvent {
    /// Dotted event type, e.g. `stage.completed`.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::PipelineCreated { .. } => "pipeline.created",
            Self::PipelineDeleted { .. } => "pipeline.deleted",
            Self::RunTriggered { .. } => "run.triggered",
            Self::RunStarted { .. } => "run.started",
            Self::StageStarted { .. } => "stage.started",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageFailed { .. } => "stage.failed",
            Self::RunCompleted { .. } => "run.completed",
            Self::RunFailed { .. } => "run.failed",
            Self::RunCancelled { .. } => "run.cancelled",
        }
    }

    /// The run this event concerns, if any.
    #[must_use]
    pub const fn run_id(&self) -> Option<Uuid> {
        match self {
            Self::PipelineCreated { .. } | Self::PipelineDeleted { .. } => None,
            Self::RunTriggered { run_id, .. }
            | Self::RunStarted { run_id, .. }
            | Self::StageStarted { run_id, .. }
            | Self::StageCompleted { run_id, .. }
            | Self::StageFailed { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::RunFailed { run_id, .. }
            | Self::RunCancelled { run_id, .. } => Some(*run_id),
        }
    }

    /// Whether this event ends a run.
    #[must_use]
    pub const fn is_run_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunCompleted { .. } | Self::RunFailed { .. } | Self::RunCancelled { .. }
        )
    }

    /// JSON payload of the event.
    #[must_use]
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
