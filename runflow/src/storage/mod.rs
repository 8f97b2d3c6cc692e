//! Persistence port for pipelines, runs and stage-runs.
//!
//! Each [`RunStore`] method is one commit: it either applies completely or
//! fails with a [`StorageError`] and leaves the store untouched.

mod memory;

pub use memory::InMemoryRunStore;

use async_trait::async_trait;
use std::fmt::Debug;
use uuid::Uuid;

use crate::errors::StorageError;
use crate::models::{Pipeline, Run, StageRun};
use crate::state_machine::{PipelineStatus, StageStatus};

/// Result type for store calls.
pub type StoreResult<T> = Result<T, StorageError>;

/// Persistence port used by the engine and the coordinator.
#[async_trait]
pub trait RunStore: Send + Sync + Debug {
    /// Persists a new pipeline together with its stages.
    async fn insert_pipeline(&self, pipeline: Pipeline) -> StoreResult<()>;

    /// Loads a pipeline with its stages.
    async fn get_pipeline(&self, pipeline_id: Uuid) -> StoreResult<Option<Pipeline>>;

    /// Lists every pipeline, oldest first.
    async fn list_pipelines(&self) -> StoreResult<Vec<Pipeline>>;

    /// Removes a pipeline and all of its runs and stage-runs.
    ///
    /// Returns `false` if the pipeline did not exist.
    async fn delete_pipeline(&self, pipeline_id: Uuid) -> StoreResult<bool>;

    /// Persists a new run and all of its stage-runs, and records it as the
    /// pipeline's latest run.
    async fn insert_run(&self, run: Run, stage_runs: Vec<StageRun>) -> StoreResult<()>;

    /// Loads a run by id.
    async fn get_run(&self, run_id: Uuid) -> StoreResult<Option<Run>>;

    /// Lists a pipeline's runs, newest first.
    async fn list_runs(&self, pipeline_id: Uuid) -> StoreResult<Vec<Run>>;

    /// Loads a run's stage-runs in ascending stage order.
    async fn get_stage_runs(&self, run_id: Uuid) -> StoreResult<Vec<StageRun>>;

    /// Overwrites an existing run.
    async fn save_run(&self, run: &Run) -> StoreResult<()>;

    /// Overwrites an existing stage-run.
    async fn save_stage_run(&self, stage_run: &StageRun) -> StoreResult<()>;

    /// Overwrites a run and a set of its stage-runs in one commit.
    async fn commit_cancellation(&self, run: &Run, stage_runs: &[StageRun]) -> StoreResult<()>;

    /// Mirrors a run's outcome onto its pipeline and stage definitions, but
    /// only if `run_id` is still the pipeline's latest run.
    ///
    /// Returns whether anything was written.
    async fn mirror_latest_run(
        &self,
        pipeline_id: Uuid,
        run_id: Uuid,
        status: PipelineStatus,
        stage_statuses: &[(Uuid, StageStatus)],
    ) -> StoreResult<bool>;
}
