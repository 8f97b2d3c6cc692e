//! Stage execution capability.
//!
//! The coordinator hands each stage to a [`StageExecutor`] and records
//! whatever comes back. A failed stage is an ordinary
//! [`ExecutionOutcome`], never an `Err`.

mod instant;
mod simulated;

pub use instant::InstantExecutor;
pub use simulated::SimulatedExecutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::config::{ExecutorConfig, ExecutorKind};
use crate::core::{ConfigMap, Environment, StageType};
use crate::models::{ResourceUsage, Run, Stage, StageRun};

/// Everything an executor is told about the stage it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageExecutionRequest {
    /// Owning pipeline.
    pub pipeline_id: Uuid,
    /// Owning run.
    pub run_id: Uuid,
    /// The stage-run being executed.
    pub stage_run_id: Uuid,
    /// The stage definition.
    pub stage_id: Uuid,
    /// Stage name.
    pub stage_name: String,
    /// Stage type.
    pub stage_type: StageType,
    /// Custom name for `CUSTOM` stages.
    pub custom_name: Option<String>,
    /// Stage order.
    pub order: u32,
    /// Stage configuration.
    pub stage_config: Option<ConfigMap>,
    /// Run-level configuration.
    pub run_config: Option<ConfigMap>,
    /// Target environment of the run.
    pub environment: Environment,
}

impl StageExecutionRequest {
    /// Assembles a request from the records involved.
    #[must_use]
    pub fn new(run: &Run, stage: &Stage, stage_run: &StageRun) -> Self {
        Self {
            pipeline_id: run.pipeline_id,
            run_id: run.id,
            stage_run_id: stage_run.id,
            stage_id: stage.id,
            stage_name: stage.name.clone(),
            stage_type: stage.stage_type,
            custom_name: stage.custom_name.clone(),
            order: stage.order,
            stage_config: stage.config.clone(),
            run_config: run.run_config.clone(),
            environment: run.environment,
        }
    }

    /// Success payload shared by the built-in executors.
    #[must_use]
    pub fn success_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "result": format!("Stage {} completed successfully", self.stage_name),
            "stage_type": self.stage_type,
            "custom_name": self.custom_name,
            "expected_artifacts": self.stage_type.expected_artifacts(),
        })
    }
}

/// Why a stage's unit of work failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ExecutionFailure {
    /// Human-readable reason, stored on the stage-run.
    pub message: String,
}

impl ExecutionFailure {
    /// Creates a failure.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of executing one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// Output payload or failure reason.
    pub result: Result<serde_json::Value, ExecutionFailure>,
    /// Duration of the unit of work, in seconds.
    pub duration_secs: f64,
    /// Resources reported by the executor.
    pub resources: ResourceUsage,
}

impl ExecutionOutcome {
    /// A successful outcome.
    #[must_use]
    pub const fn success(output: serde_json::Value, duration_secs: f64, resources: ResourceUsage) -> Self {
        Self {
            result: Ok(output),
            duration_secs,
            resources,
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(message: impl Into<String>, duration_secs: f64, resources: ResourceUsage) -> Self {
        Self {
            result: Err(ExecutionFailure::new(message)),
            duration_secs,
            resources,
        }
    }

    /// An execution abandoned because its run was cancelled.
    #[must_use]
    pub fn interrupted(duration_secs: f64) -> Self {
        Self::failure("Stage execution interrupted", duration_secs, ResourceUsage::default())
    }

    /// Whether the unit of work succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs the unit of work behind a stage.
///
/// Implementations should return promptly once `cancel` fires; whatever they
/// return after that point is discarded.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageExecutor: Send + Sync + Debug {
    /// Executes one stage.
    async fn execute(
        &self,
        request: &StageExecutionRequest,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome;
}

/// Builds the executor selected by `config`.
#[must_use]
pub fn build_executor(config: &ExecutorConfig) -> Arc<dyn StageExecutor> {
    match config.kind {
        ExecutorKind::Simulated => Arc::new(SimulatedExecutor::new(config.clone())),
        ExecutorKind::Instant => Arc::new(InstantExecutor::new()),
    }
}
