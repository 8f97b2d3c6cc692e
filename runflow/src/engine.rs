//! The engine facade.
//!
//! [`RunEngine`] is what an API layer talks to: it validates and stores
//! pipelines, triggers runs onto detached coordinator tasks, reads run
//! state back, and cancels runs.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::cancellation::{RunGuard, RunHandle, RunRegistry};
use crate::config::EngineConfig;
use crate::coordinator::{RunCoordinator, RunExit, RunStatistics};
use crate::errors::{NotFoundError, Result, StorageError};
use crate::events::{EngineEvent, EventSink, NoOpEventSink};
use crate::execution::{build_executor, StageExecutor};
use crate::models::{Pipeline, PipelineDefinition, Run, RunDetails, StageRun, TriggerRequest};
use crate::observability::run_span;
use crate::pipeline::validate_definition;
use crate::storage::{InMemoryRunStore, RunStore};

/// Builder for [`RunEngine`].
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn RunStore>>,
    executor: Option<Arc<dyn StageExecutor>>,
    events: Option<Arc<dyn EventSink>>,
}

impl EngineBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the store. Defaults to an [`InMemoryRunStore`].
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the executor. Defaults to the one named by the configuration.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets the event sink. Defaults to [`NoOpEventSink`].
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Validates the configuration and builds the engine.
    pub fn build(self) -> Result<RunEngine> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryRunStore::new()));
        let executor = self
            .executor
            .unwrap_or_else(|| build_executor(&self.config.executor));
        let events = self.events.unwrap_or_else(|| Arc::new(NoOpEventSink));
        let coordinator = RunCoordinator::new(
            Arc::clone(&store),
            executor,
            Arc::clone(&events),
            self.config.max_concurrent_runs,
        );

        Ok(RunEngine {
            inner: Arc::new(EngineInner {
                config: self.config,
                store,
                coordinator,
                registry: Arc::new(RunRegistry::new()),
                events,
            }),
        })
    }
}

#[derive(Debug)]
struct EngineInner {
    config: EngineConfig,
    store: Arc<dyn RunStore>,
    coordinator: RunCoordinator,
    registry: Arc<RunRegistry>,
    events: Arc<dyn EventSink>,
}

/// Run-orchestration engine. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct RunEngine {
    inner: Arc<EngineInner>,
}

impl RunEngine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Builds an engine from configuration alone.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        EngineBuilder::new().with_config(config).build()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Number of runs whose coordinator is still alive.
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.inner.registry.len()
    }

    /// Validates `definition` and stores it as a new pipeline.
    ///
    /// Nothing is written unless validation passes.
    pub async fn validate_and_create_pipeline(&self, definition: PipelineDefinition) -> Result<Pipeline> {
        validate_definition(&definition)?;

        let pipeline = Pipeline::from_definition(definition);
        self.inner.store.insert_pipeline(pipeline.clone()).await?;

        info!(pipeline_id = %pipeline.id, name = %pipeline.name, stages = pipeline.stage_count(), "Pipeline created");
        self.inner.events.try_emit(&EngineEvent::PipelineCreated {
            pipeline_id: pipeline.id,
            name: pipeline.name.clone(),
            stage_count: pipeline.stage_count(),
        });
        Ok(pipeline)
    }

    /// Loads a pipeline.
    pub async fn get_pipeline(&self, pipeline_id: Uuid) -> Result<Pipeline> {
        Ok(self
            .inner
            .store
            .get_pipeline(pipeline_id)
            .await?
            .ok_or(NotFoundError::Pipeline(pipeline_id))?)
    }

    /// Lists every pipeline, oldest first.
    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        Ok(self.inner.store.list_pipelines().await?)
    }

    /// Cancels the pipeline's in-flight runs, then removes it with all of
    /// its stages, runs and stage-runs.
    pub async fn delete_pipeline(&self, pipeline_id: Uuid) -> Result<()> {
        self.get_pipeline(pipeline_id).await?;

        for (run_id, handle) in self.inner.registry.runs_for_pipeline(pipeline_id) {
            self.inner
                .coordinator
                .cancel(run_id, Some(&handle), "Pipeline deleted")
                .await?;
        }

        if !self.inner.store.delete_pipeline(pipeline_id).await? {
            return Err(NotFoundError::Pipeline(pipeline_id).into());
        }

        info!(%pipeline_id, "Pipeline deleted");
        self.inner
            .events
            .try_emit(&EngineEvent::PipelineDeleted { pipeline_id });
        Ok(())
    }

    /// Creates a `PENDING` run with one stage-run per stage and hands it to
    /// a detached coordinator.
    ///
    /// Returns before any stage starts.
    pub async fn trigger_run(&self, pipeline_id: Uuid, request: TriggerRequest) -> Result<Run> {
        let pipeline = self.get_pipeline(pipeline_id).await?;

        let run = Run::new(pipeline.id, request, self.inner.config.environment);
        let stage_runs: Vec<StageRun> = pipeline
            .stages
            .iter()
            .map(|stage| StageRun::new(run.id, stage, run.created_at))
            .collect();

        // Registered before the insert so a cancel racing the trigger finds
        // the handle.
        let handle = self.inner.registry.register(run.id, pipeline.id);
        if let Err(e) = self.inner.store.insert_run(run.clone(), stage_runs).await {
            self.inner.registry.finish(run.id);
            // A delete racing the trigger surfaces as a conflict.
            if matches!(e, StorageError::Conflict(_))
                && self.inner.store.get_pipeline(pipeline_id).await?.is_none()
            {
                return Err(NotFoundError::Pipeline(pipeline_id).into());
            }
            return Err(e.into());
        }

        info!(
            %pipeline_id,
            run_id = %run.id,
            trigger_type = %run.trigger_type,
            environment = %run.environment,
            "Run triggered"
        );
        self.inner.events.try_emit(&EngineEvent::RunTriggered {
            pipeline_id,
            run_id: run.id,
            trigger_type: run.trigger_type,
        });

        if let Some(timeout) = self.inner.config.run_timeout() {
            self.spawn_timeout_watcher(run.id, handle.clone(), timeout);
        }
        self.spawn_coordinator(pipeline, run.id, handle);

        Ok(run)
    }

    /// Loads a run and its stage-runs.
    pub async fn get_run(&self, pipeline_id: Uuid, run_id: Uuid) -> Result<RunDetails> {
        let run = self
            .inner
            .store
            .get_run(run_id)
            .await?
            .filter(|run| run.pipeline_id == pipeline_id)
            .ok_or(NotFoundError::Run(run_id))?;
        let stage_runs = self.inner.store.get_stage_runs(run_id).await?;
        Ok(RunDetails::new(run, stage_runs))
    }

    /// Lists a pipeline's runs, newest first.
    pub async fn list_runs(&self, pipeline_id: Uuid) -> Result<Vec<Run>> {
        self.get_pipeline(pipeline_id).await?;
        Ok(self.inner.store.list_runs(pipeline_id).await?)
    }

    /// Cancels a run still `PENDING` or `RUNNING`.
    ///
    /// Returns `false`, writing nothing, if the run is unknown, belongs to
    /// another pipeline, or is already terminal.
    pub async fn cancel_run(&self, pipeline_id: Uuid, run_id: Uuid) -> Result<bool> {
        let belongs = self
            .inner
            .store
            .get_run(run_id)
            .await?
            .is_some_and(|run| run.pipeline_id == pipeline_id);
        if !belongs {
            return Ok(false);
        }

        let handle = self.inner.registry.get(run_id);
        self.inner
            .coordinator
            .cancel(run_id, handle.as_ref(), "Cancelled by user")
            .await
    }

    /// Summarises every run of a pipeline.
    pub async fn run_statistics(&self, pipeline_id: Uuid) -> Result<RunStatistics> {
        let runs = self.list_runs(pipeline_id).await?;
        Ok(RunStatistics::from_runs(pipeline_id, &runs))
    }

    /// Waits for a run's coordinator to exit, then returns the run.
    pub async fn wait_for_run(&self, pipeline_id: Uuid, run_id: Uuid) -> Result<RunDetails> {
        if let Some(handle) = self.inner.registry.get(run_id) {
            handle.wait_done().await;
        }
        self.get_run(pipeline_id, run_id).await
    }

    /// Cancels every in-flight run and waits for their coordinators.
    pub async fn shutdown(&self) {
        let run_ids = self.inner.registry.active_ids();
        info!(active_runs = run_ids.len(), "Shutting down engine");

        let mut handles = Vec::with_capacity(run_ids.len());
        for run_id in run_ids {
            let Some(handle) = self.inner.registry.get(run_id) else {
                continue;
            };
            if let Err(e) = self
                .inner
                .coordinator
                .cancel(run_id, Some(&handle), "Engine shutdown")
                .await
            {
                error!(%run_id, error = %e, "Failed to cancel run during shutdown");
                handle.token.cancel("Engine shutdown");
            }
            handles.push(handle);
        }

        futures::future::join_all(handles.iter().map(RunHandle::wait_done)).await;
    }

    fn spawn_coordinator(&self, pipeline: Pipeline, run_id: Uuid, handle: RunHandle) {
        let inner = Arc::clone(&self.inner);
        let span = run_span(pipeline.id, run_id);
        tokio::spawn(
            async move {
                let _guard = RunGuard::new(Arc::clone(&inner.registry), run_id);
                match inner.coordinator.drive(&pipeline, run_id, &handle).await {
                    Ok(RunExit::Finished(status)) => debug!(%status, "Coordinator finished"),
                    Ok(RunExit::Cancelled) => debug!("Coordinator stopped after cancellation"),
                    Err(e) => error!(
                        error = %e,
                        kind = %e.kind(),
                        "Coordinator stopped; run left in its last committed state"
                    ),
                }
            }
            .instrument(span),
        );
    }

    fn spawn_timeout_watcher(&self, run_id: Uuid, handle: RunHandle, timeout: Duration) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                () = handle.wait_done() => {}
                () = tokio::time::sleep(timeout) => {
                    let reason = format!("Run exceeded timeout of {}s", timeout.as_secs_f64());
                    match inner.coordinator.cancel(run_id, Some(&handle), &reason).await {
                        Ok(true) => warn!(%run_id, "Run timed out"),
                        Ok(false) => {}
                        Err(e) => error!(%run_id, error = %e, "Failed to cancel timed out run"),
                    }
                }
            }
        });
    }
}
