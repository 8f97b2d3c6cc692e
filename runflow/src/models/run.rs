//! Run and stage-run records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Stage;
use crate::core::{ConfigMap, Environment, TriggerType};
use crate::errors::TransitionError;
use crate::state_machine::{Lifecycle, LifecycleEvent, RunStatus, StageStatus};

/// Seconds elapsed between two instants, clamped at zero.
#[must_use]
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).to_std().map_or(0.0, |d| d.as_secs_f64())
}

/// Resource usage reported for one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Peak memory in megabytes.
    pub memory_mb: Option<f64>,
    /// Peak CPU utilisation in percent.
    pub cpu_percent: Option<f64>,
}

impl ResourceUsage {
    /// Creates a usage record with both metrics present.
    #[must_use]
    pub const fn new(memory_mb: f64, cpu_percent: f64) -> Self {
        Self {
            memory_mb: Some(memory_mb),
            cpu_percent: Some(cpu_percent),
        }
    }
}

/// Trigger metadata supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    /// What caused the run.
    #[serde(default)]
    pub trigger_type: TriggerType,
    /// Actor that triggered the run.
    #[serde(default)]
    pub triggered_by: Option<String>,
    /// Run-specific configuration overrides.
    #[serde(default)]
    pub run_config: Option<ConfigMap>,
    /// Target environment; the engine default applies when absent.
    #[serde(default)]
    pub environment: Option<Environment>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl TriggerRequest {
    /// A manual trigger with no metadata.
    #[must_use]
    pub fn manual() -> Self {
        Self::default()
    }

    /// Sets the trigger type.
    #[must_use]
    pub fn with_trigger_type(mut self, trigger_type: TriggerType) -> Self {
        self.trigger_type = trigger_type;
        self
    }

    /// Sets the triggering actor.
    #[must_use]
    pub fn triggered_by(mut self, actor: impl Into<String>) -> Self {
        self.triggered_by = Some(actor.into());
        self
    }

    /// Sets the run configuration override.
    #[must_use]
    pub fn with_run_config(mut self, config: ConfigMap) -> Self {
        self.run_config = Some(config);
        self
    }

    /// Sets the target environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// One execution attempt of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run identity.
    pub id: Uuid,
    /// Owning pipeline.
    pub pipeline_id: Uuid,
    /// Lifecycle status.
    pub status: RunStatus,
    /// What caused the run.
    pub trigger_type: TriggerType,
    /// Actor that triggered the run.
    pub triggered_by: Option<String>,
    /// Run-specific configuration overrides.
    pub run_config: Option<ConfigMap>,
    /// Target environment.
    pub environment: Environment,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// When the coordinator started the run.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// `completed_at - started_at` in seconds.
    pub execution_time: Option<f64>,
    /// Stage-runs that completed.
    pub success_count: u32,
    /// Stage-runs that failed.
    pub failed_count: u32,
    /// Peak memory across stage-runs, in megabytes.
    pub max_memory_usage: Option<f64>,
    /// Peak CPU across stage-runs, in percent.
    pub max_cpu_usage: Option<f64>,
    /// Why the run failed.
    pub error_message: Option<String>,
    /// Final output payload.
    pub output: Option<serde_json::Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Creates a pending run for `pipeline_id`.
    #[must_use]
    pub fn new(pipeline_id: Uuid, request: TriggerRequest, default_environment: Environment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            status: RunStatus::Pending,
            trigger_type: request.trigger_type,
            triggered_by: request.triggered_by,
            run_config: request.run_config,
            environment: request.environment.unwrap_or(default_environment),
            tags: request.tags,
            notes: request.notes,
            started_at: None,
            completed_at: None,
            execution_time: None,
            success_count: 0,
            failed_count: 0,
            max_memory_usage: None,
            max_cpu_usage: None,
            error_message: None,
            output: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `PENDING → RUNNING`, stamping `started_at`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.fire(&LifecycleEvent::Start)?;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `RUNNING → COMPLETED` with a success payload.
    pub fn complete(&mut self, output: serde_json::Value) -> Result<(), TransitionError> {
        self.fire(&LifecycleEvent::Complete)?;
        self.output = Some(output);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `RUNNING → FAILED`, blaming `stage_name`.
    pub fn fail_at_stage(&mut self, stage_name: &str) -> Result<(), TransitionError> {
        let message = format!("Pipeline failed at stage: {stage_name}");
        self.fire(&LifecycleEvent::Fail(message.clone()))?;
        self.error_message = Some(message);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `PENDING|RUNNING → CANCELLED`, stamping completion and, if the run had
    /// started, its execution time.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.fire(&LifecycleEvent::Cancel)?;
        self.completed_at = Some(now);
        self.execution_time = self.started_at.map(|start| seconds_between(start, now));
        self.updated_at = now;
        Ok(())
    }

    /// Stamps completion time and execution time once terminal.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.completed_at = Some(now);
        self.execution_time = self.started_at.map(|start| seconds_between(start, now));
        self.updated_at = now;
    }

    /// Counts a completed stage-run.
    pub fn record_success(&mut self) {
        self.success_count += 1;
        self.updated_at = Utc::now();
    }

    /// Counts a failed stage-run.
    pub fn record_failure(&mut self) {
        self.failed_count += 1;
        self.updated_at = Utc::now();
    }
}

impl Lifecycle for Run {
    const ENTITY: &'static str = "run";

    fn status(&self) -> RunStatus {
        self.status
    }

    fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }
}

/// The execution record of one stage within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRun {
    /// Stage-run identity.
    pub id: Uuid,
    /// Owning run.
    pub run_id: Uuid,
    /// Stage this record executes.
    pub stage_id: Uuid,
    /// The stage's order, copied for sorting.
    pub stage_order: u32,
    /// The stage's name, copied for messages.
    pub stage_name: String,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Attempt number, reserved for retries.
    pub attempt_number: u32,
    /// When execution began.
    pub started_at: Option<DateTime<Utc>>,
    /// When execution ended.
    pub completed_at: Option<DateTime<Utc>>,
    /// Duration of the unit of work in seconds.
    pub execution_time: Option<f64>,
    /// Memory used, in megabytes.
    pub memory_usage: Option<f64>,
    /// CPU used, in percent.
    pub cpu_usage: Option<f64>,
    /// Output payload on success.
    pub output: Option<serde_json::Value>,
    /// Error message on failure.
    pub error_message: Option<String>,
    /// Execution logs.
    pub logs: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl StageRun {
    /// Creates a pending stage-run for `stage` within `run_id`.
    #[must_use]
    pub fn new(run_id: Uuid, stage: &Stage, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            stage_id: stage.id,
            stage_order: stage.order,
            stage_name: stage.name.clone(),
            status: RunStatus::Pending,
            attempt_number: 1,
            started_at: None,
            completed_at: None,
            execution_time: None,
            memory_usage: None,
            cpu_usage: None,
            output: None,
            error_message: None,
            logs: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `PENDING → RUNNING`, stamping `started_at`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.fire(&LifecycleEvent::Start)?;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `RUNNING → COMPLETED` with the executor's results.
    pub fn complete(
        &mut self,
        output: serde_json::Value,
        duration_secs: f64,
        usage: ResourceUsage,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.fire(&LifecycleEvent::Complete)?;
        self.output = Some(output);
        self.record_finish(duration_secs, usage, now);
        Ok(())
    }

    /// `RUNNING → FAILED` with the executor's reason.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        duration_secs: f64,
        usage: ResourceUsage,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let message = message.into();
        self.fire(&LifecycleEvent::Fail(message.clone()))?;
        self.error_message = Some(message);
        self.record_finish(duration_secs, usage, now);
        Ok(())
    }

    /// `PENDING|RUNNING → CANCELLED`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.fire(&LifecycleEvent::Cancel)?;
        self.completed_at = Some(now);
        self.execution_time = self.started_at.map(|start| seconds_between(start, now));
        self.updated_at = now;
        Ok(())
    }

    /// Status as seen from the stage definition's point of view.
    #[must_use]
    pub const fn logical_status(&self, run_status: RunStatus) -> StageStatus {
        StageStatus::from_stage_run(self.status, run_status)
    }

    /// Appends a line to the execution log.
    pub fn append_log(&mut self, line: impl AsRef<str>) {
        let logs = self.logs.get_or_insert_with(String::new);
        if !logs.is_empty() {
            logs.push('\n');
        }
        logs.push_str(line.as_ref());
    }

    fn record_finish(&mut self, duration_secs: f64, usage: ResourceUsage, now: DateTime<Utc>) {
        self.completed_at = Some(now);
        self.execution_time = Some(duration_secs);
        self.memory_usage = usage.memory_mb;
        self.cpu_usage = usage.cpu_percent;
        self.updated_at = now;
    }
}

impl Lifecycle for StageRun {
    const ENTITY: &'static str = "stage_run";

    fn status(&self) -> RunStatus {
        self.status
    }

    fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }
}

/// A run together with its stage-runs, sorted by stage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetails {
    /// The run.
    pub run: Run,
    /// Its stage-runs in ascending stage order.
    pub stage_runs: Vec<StageRun>,
}

impl RunDetails {
    /// Bundles a run with its stage-runs, sorting them by stage order.
    #[must_use]
    pub fn new(run: Run, mut stage_runs: Vec<StageRun>) -> Self {
        stage_runs.sort_by_key(|sr| sr.stage_order);
        Self { run, stage_runs }
    }

    /// Logical status of each stage-run, in stage order.
    #[must_use]
    pub fn stage_statuses(&self) -> Vec<(u32, StageStatus)> {
        self.stage_runs
            .iter()
            .map(|sr| (sr.stage_order, sr.logical_status(self.run.status)))
            .collect()
    }

    /// Number of stage-runs that have been started.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.stage_runs
            .iter()
            .filter(|sr| sr.started_at.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageType;
    use crate::models::StageDefinition;
    use chrono::Duration;

    fn stage(order: u32) -> Stage {
        Stage::from_definition(
            Uuid::new_v4(),
            StageDefinition::new(format!("s{order}"), StageType::DataIngestion, order),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_run_uses_default_environment() {
        let run = Run::new(Uuid::new_v4(), TriggerRequest::manual(), Environment::Staging);
        assert_eq!(run.environment, Environment::Staging);
        assert_eq!(run.status, RunStatus::Pending);

        let run = Run::new(
            Uuid::new_v4(),
            TriggerRequest::manual().with_environment(Environment::Production),
            Environment::Staging,
        );
        assert_eq!(run.environment, Environment::Production);
    }

    #[test]
    fn test_run_lifecycle_timestamps() {
        let mut run = Run::new(Uuid::new_v4(), TriggerRequest::manual(), Environment::default());
        let t0 = Utc::now();
        run.start(t0).unwrap();
        run.complete(serde_json::json!({"message": "ok"})).unwrap();
        run.finish(t0 + Duration::seconds(3));

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.execution_time, Some(3.0));
    }

    #[test]
    fn test_run_fail_sets_message() {
        let mut run = Run::new(Uuid::new_v4(), TriggerRequest::manual(), Environment::default());
        run.start(Utc::now()).unwrap();
        run.fail_at_stage("train").unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(
            run.error_message.as_deref(),
            Some("Pipeline failed at stage: train")
        );
    }

    #[test]
    fn test_cancel_pending_run_has_no_execution_time() {
        let mut run = Run::new(Uuid::new_v4(), TriggerRequest::manual(), Environment::default());
        run.cancel(Utc::now()).unwrap();

        assert_eq!(run.status, RunStatus::Cancelled);
        assert!(run.completed_at.is_some());
        assert_eq!(run.execution_time, None);
        assert!(run.cancel(Utc::now()).is_err());
    }

    #[test]
    fn test_stage_run_complete_records_usage() {
        let mut sr = StageRun::new(Uuid::new_v4(), &stage(0), Utc::now());
        sr.start(Utc::now()).unwrap();
        sr.complete(
            serde_json::json!({"result": "ok"}),
            2.5,
            ResourceUsage::new(256.0, 40.0),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(sr.status, RunStatus::Completed);
        assert_eq!(sr.execution_time, Some(2.5));
        assert_eq!(sr.memory_usage, Some(256.0));
        assert_eq!(sr.cpu_usage, Some(40.0));
    }

    #[test]
    fn test_stage_run_cannot_complete_twice() {
        let mut sr = StageRun::new(Uuid::new_v4(), &stage(0), Utc::now());
        sr.start(Utc::now()).unwrap();
        sr.fail("boom", 1.0, ResourceUsage::default(), Utc::now()).unwrap();

        let err = sr
            .complete(serde_json::Value::Null, 1.0, ResourceUsage::default(), Utc::now())
            .unwrap_err();
        assert_eq!(err.entity, "stage_run");
        assert_eq!(sr.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_run_details_sorted_and_logical_status() {
        let run_id = Uuid::new_v4();
        let mut run = Run::new(Uuid::new_v4(), TriggerRequest::manual(), Environment::default());
        run.id = run_id;
        run.start(Utc::now()).unwrap();
        run.fail_at_stage("s0").unwrap();

        let mut first = StageRun::new(run_id, &stage(0), Utc::now());
        first.start(Utc::now()).unwrap();
        first.fail("boom", 1.0, ResourceUsage::default(), Utc::now()).unwrap();
        let second = StageRun::new(run_id, &stage(1), Utc::now());

        let details = RunDetails::new(run, vec![second, first]);

        assert_eq!(
            details.stage_statuses(),
            vec![(0, StageStatus::Failed), (1, StageStatus::Skipped)]
        );
        assert_eq!(details.started_count(), 1);
    }

    #[test]
    fn test_append_log() {
        let mut sr = StageRun::new(Uuid::new_v4(), &stage(0), Utc::now());
        sr.append_log("started");
        sr.append_log("finished");
        assert_eq!(sr.logs.as_deref(), Some("started\nfinished"));
    }
}
