//! Drives one run from `PENDING` to a terminal status.
//!
//! Stage-runs execute strictly one after another in ascending stage order.
//! Every write happens under the run's write lock after re-checking its
//! cancellation token, so the cancel path and the coordinator never
//! interleave their updates; results that arrive after cancellation are
//! dropped.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::metrics::RunMetrics;
use crate::cancellation::RunHandle;
use crate::errors::{NotFoundError, Result, RunflowError};
use crate::events::{EngineEvent, EventSink};
use crate::execution::{StageExecutionRequest, StageExecutor};
use crate::models::{Pipeline, Run, StageRun};
use crate::observability::stage_span;
use crate::pipeline::StageGraph;
use crate::state_machine::{PipelineStatus, RunStatus};
use crate::storage::RunStore;

/// How a coordinator task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The run reached this terminal status on its own.
    Finished(RunStatus),
    /// The run was cancelled before it could finish.
    Cancelled,
}

/// Success payload stored on a completed run.
fn completion_payload() -> serde_json::Value {
    serde_json::json!({ "message": "Pipeline completed successfully" })
}

/// Executes runs and applies cancellations.
#[derive(Debug, Clone)]
pub struct RunCoordinator {
    store: Arc<dyn RunStore>,
    executor: Arc<dyn StageExecutor>,
    events: Arc<dyn EventSink>,
    permits: Arc<Semaphore>,
}

impl RunCoordinator {
    /// Creates a coordinator allowing `max_concurrent_runs` runs to execute
    /// at once.
    #[must_use]
    pub fn new(
        store: Arc<dyn RunStore>,
        executor: Arc<dyn StageExecutor>,
        events: Arc<dyn EventSink>,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            store,
            executor,
            events,
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    /// Drives `run_id` of `pipeline` to completion.
    ///
    /// Stage failures end the run as `FAILED` and are not errors. An `Err`
    /// means a commit failed; the run keeps whatever state was last
    /// committed.
    pub async fn drive(&self, pipeline: &Pipeline, run_id: Uuid, handle: &RunHandle) -> Result<RunExit> {
        let token = &handle.token;

        let _permit = tokio::select! {
            permit = self.permits.acquire() => permit
                .map_err(|_| RunflowError::Internal("run scheduler is closed".into()))?,
            () = token.cancelled() => return Ok(RunExit::Cancelled),
        };

        let (mut run, mut stage_runs) = {
            let _write = handle.write_lock.lock().await;
            if token.is_cancelled() {
                return Ok(RunExit::Cancelled);
            }
            let mut run = self
                .store
                .get_run(run_id)
                .await?
                .ok_or(NotFoundError::Run(run_id))?;
            let stage_runs = self.store.get_stage_runs(run_id).await?;

            run.start(Utc::now())?;
            self.store.save_run(&run).await?;
            self.mirror(&run, &stage_runs).await?;
            (run, stage_runs)
        };

        info!(stages = stage_runs.len(), "Run started");
        self.events.try_emit(&EngineEvent::RunStarted {
            pipeline_id: run.pipeline_id,
            run_id,
        });

        let graph = StageGraph::from_stages(&pipeline.stages);
        for order in graph.execution_order() {
            let Some(idx) = stage_runs.iter().position(|sr| sr.stage_order == order) else {
                continue;
            };
            let Some(stage) = pipeline.stage(stage_runs[idx].stage_id) else {
                continue;
            };

            {
                let _write = handle.write_lock.lock().await;
                if token.is_cancelled() {
                    return Ok(RunExit::Cancelled);
                }
                let stage_run = &mut stage_runs[idx];
                stage_run.start(Utc::now())?;
                stage_run.append_log(format!("Stage {} started", stage.name));
                self.store.save_stage_run(stage_run).await?;
            }
            self.events.try_emit(&EngineEvent::StageStarted {
                run_id,
                stage_run_id: stage_runs[idx].id,
                stage: stage.name.clone(),
                order,
            });

            let request = StageExecutionRequest::new(&run, stage, &stage_runs[idx]);
            let outcome = self
                .executor
                .execute(&request, token)
                .instrument(stage_span(&stage.name, order))
                .await;

            let _write = handle.write_lock.lock().await;
            if token.is_cancelled() {
                debug!(
                    stage = %stage.name,
                    order,
                    reason = %token.reason().unwrap_or_default(),
                    "Discarding result of cancelled run"
                );
                return Ok(RunExit::Cancelled);
            }

            let stage_run = &mut stage_runs[idx];
            match outcome.result {
                Ok(output) => {
                    stage_run.complete(output, outcome.duration_secs, outcome.resources, Utc::now())?;
                    stage_run.append_log(format!(
                        "Stage {} completed in {:.2}s",
                        stage.name, outcome.duration_secs
                    ));
                    self.store.save_stage_run(stage_run).await?;
                    run.record_success();
                    self.store.save_run(&run).await?;

                    info!(stage = %stage.name, order, execution_time = outcome.duration_secs, "Stage completed");
                    self.events.try_emit(&EngineEvent::StageCompleted {
                        run_id,
                        stage_run_id: stage_run.id,
                        stage: stage.name.clone(),
                        order,
                        execution_time: outcome.duration_secs,
                    });
                }
                Err(failure) => {
                    stage_run.fail(
                        failure.message.clone(),
                        outcome.duration_secs,
                        outcome.resources,
                        Utc::now(),
                    )?;
                    stage_run.append_log(format!("Stage {} failed: {}", stage.name, failure.message));
                    self.store.save_stage_run(stage_run).await?;
                    run.record_failure();
                    run.fail_at_stage(&stage.name)?;
                    self.store.save_run(&run).await?;

                    warn!(
                        stage = %stage.name,
                        order,
                        error = %failure.message,
                        unreached = stage_runs.len() - (idx + 1),
                        dependents = graph.downstream(order).len(),
                        "Stage failed; stopping run"
                    );
                    self.events.try_emit(&EngineEvent::StageFailed {
                        run_id,
                        stage_run_id: stage_runs[idx].id,
                        stage: stage.name.clone(),
                        order,
                        error: failure.message,
                    });
                    break;
                }
            }
        }

        let _write = handle.write_lock.lock().await;
        if token.is_cancelled() {
            return Ok(RunExit::Cancelled);
        }
        if run.status == RunStatus::Running {
            run.complete(completion_payload())?;
        }
        run.finish(Utc::now());
        RunMetrics::aggregate(&stage_runs).apply_to(&mut run);
        self.store.save_run(&run).await?;
        if let Err(e) = self.mirror(&run, &stage_runs).await {
            error!(%run_id, error = %e, "Run finished but pipeline status was not updated");
        }

        self.emit_terminal(&run);
        Ok(RunExit::Finished(run.status))
    }

    /// Cancels `run_id` if it is still `PENDING` or `RUNNING`.
    ///
    /// With a live handle the update happens under the run's write lock and
    /// the token is signalled only after the commit succeeded. Without one
    /// (a run whose coordinator is gone) the records are cancelled directly.
    /// Returns `false` and writes nothing if the run is unknown or terminal.
    pub async fn cancel(&self, run_id: Uuid, handle: Option<&RunHandle>, reason: &str) -> Result<bool> {
        let _write = match handle {
            Some(handle) => Some(handle.write_lock.lock().await),
            None => None,
        };

        let Some(mut run) = self.store.get_run(run_id).await? else {
            return Ok(false);
        };
        if !run.status.is_cancellable() {
            return Ok(false);
        }

        let now = Utc::now();
        run.cancel(now)?;
        let mut stage_runs = self.store.get_stage_runs(run_id).await?;
        let mut touched = Vec::new();
        for stage_run in &mut stage_runs {
            if stage_run.status.is_cancellable() {
                stage_run.cancel(now)?;
                stage_run.append_log(format!("Cancelled: {reason}"));
                touched.push(stage_run.clone());
            }
        }
        self.store.commit_cancellation(&run, &touched).await?;

        if let Some(handle) = handle {
            handle.token.cancel(reason);
        }

        if let Err(e) = self.mirror(&run, &stage_runs).await {
            error!(%run_id, error = %e, "Run cancelled but pipeline status was not updated");
        }

        warn!(%run_id, pipeline_id = %run.pipeline_id, reason, cancelled_stage_runs = touched.len(), "Run cancelled");
        self.events.try_emit(&EngineEvent::RunCancelled {
            pipeline_id: run.pipeline_id,
            run_id,
            reason: reason.to_string(),
        });
        Ok(true)
    }

    /// Mirrors the run onto its pipeline if it is still the latest run.
    async fn mirror(&self, run: &Run, stage_runs: &[StageRun]) -> Result<()> {
        let stage_statuses: Vec<_> = stage_runs
            .iter()
            .map(|sr| (sr.stage_id, sr.logical_status(run.status)))
            .collect();
        self.store
            .mirror_latest_run(
                run.pipeline_id,
                run.id,
                PipelineStatus::from(run.status),
                &stage_statuses,
            )
            .await?;
        Ok(())
    }

    fn emit_terminal(&self, run: &Run) {
        let event = match run.status {
            RunStatus::Completed => {
                info!(
                    execution_time = run.execution_time,
                    success_count = run.success_count,
                    "Run completed"
                );
                EngineEvent::RunCompleted {
                    pipeline_id: run.pipeline_id,
                    run_id: run.id,
                    execution_time: run.execution_time,
                }
            }
            _ => {
                let error = run.error_message.clone().unwrap_or_default();
                warn!(error = %error, failed_count = run.failed_count, "Run failed");
                EngineEvent::RunFailed {
                    pipeline_id: run.pipeline_id,
                    run_id: run.id,
                    error,
                }
            }
        };
        self.events.try_emit(&event);
    }
}
