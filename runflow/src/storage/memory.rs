//! In-memory [`RunStore`] implementation.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use uuid::Uuid;

use super::{RunStore, StoreResult};
use crate::errors::StorageError;
use crate::models::{Pipeline, Run, StageRun};
use crate::state_machine::{PipelineStatus, StageStatus};

#[derive(Debug, Default)]
struct Tables {
    pipelines: HashMap<Uuid, Pipeline>,
    runs: HashMap<Uuid, Run>,
    stage_runs: HashMap<Uuid, StageRun>,
}

/// In-memory store guarded by a single lock.
///
/// Every call validates before it mutates, so a rejected call leaves no
/// trace. Write faults can be injected with
/// [`InMemoryRunStore::fail_writes_after`].
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    tables: RwLock<Tables>,
    write_budget: Mutex<Option<usize>>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the next `n` writes succeed and fails every write after that.
    pub fn fail_writes_after(&self, n: usize) {
        *self.write_budget.lock() = Some(n);
    }

    /// Clears any injected write fault.
    pub fn heal(&self) {
        *self.write_budget.lock() = None;
    }

    /// Number of stored pipelines.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.tables.read().pipelines.len()
    }

    /// Number of stored runs across all pipelines.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.tables.read().runs.len()
    }

    /// Number of stored stage-runs across all runs.
    #[must_use]
    pub fn stage_run_count(&self) -> usize {
        self.tables.read().stage_runs.len()
    }

    fn check_write(&self) -> StoreResult<()> {
        let mut budget = self.write_budget.lock();
        match budget.as_mut() {
            None => Ok(()),
            Some(0) => Err(StorageError::write("injected write failure")),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn insert_pipeline(&self, pipeline: Pipeline) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.pipelines.contains_key(&pipeline.id) {
            return Err(StorageError::conflict(format!(
                "pipeline {} already exists",
                pipeline.id
            )));
        }
        self.check_write()?;
        tables.pipelines.insert(pipeline.id, pipeline);
        Ok(())
    }

    async fn get_pipeline(&self, pipeline_id: Uuid) -> StoreResult<Option<Pipeline>> {
        Ok(self.tables.read().pipelines.get(&pipeline_id).cloned())
    }

    async fn list_pipelines(&self) -> StoreResult<Vec<Pipeline>> {
        let mut pipelines: Vec<Pipeline> = self.tables.read().pipelines.values().cloned().collect();
        pipelines.sort_by_key(|p| p.created_at);
        Ok(pipelines)
    }

    async fn delete_pipeline(&self, pipeline_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if !tables.pipelines.contains_key(&pipeline_id) {
            return Ok(false);
        }
        self.check_write()?;

        tables.pipelines.remove(&pipeline_id);
        let run_ids: Vec<Uuid> = tables
            .runs
            .values()
            .filter(|run| run.pipeline_id == pipeline_id)
            .map(|run| run.id)
            .collect();
        for run_id in &run_ids {
            tables.runs.remove(run_id);
        }
        tables
            .stage_runs
            .retain(|_, stage_run| !run_ids.contains(&stage_run.run_id));
        Ok(true)
    }

    async fn insert_run(&self, run: Run, stage_runs: Vec<StageRun>) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.pipelines.contains_key(&run.pipeline_id) {
            return Err(StorageError::conflict(format!(
                "pipeline {} does not exist",
                run.pipeline_id
            )));
        }
        if tables.runs.contains_key(&run.id) {
            return Err(StorageError::conflict(format!("run {} already exists", run.id)));
        }
        if let Some(stray) = stage_runs.iter().find(|sr| sr.run_id != run.id) {
            return Err(StorageError::conflict(format!(
                "stage run {} does not belong to run {}",
                stray.id, run.id
            )));
        }
        self.check_write()?;

        if let Some(pipeline) = tables.pipelines.get_mut(&run.pipeline_id) {
            pipeline.latest_run_id = Some(run.id);
            pipeline.updated_at = Utc::now();
        }
        for stage_run in stage_runs {
            tables.stage_runs.insert(stage_run.id, stage_run);
        }
        tables.runs.insert(run.id, run);
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> StoreResult<Option<Run>> {
        Ok(self.tables.read().runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_id: Uuid) -> StoreResult<Vec<Run>> {
        let mut runs: Vec<Run> = self
            .tables
            .read()
            .runs
            .values()
            .filter(|run| run.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    async fn get_stage_runs(&self, run_id: Uuid) -> StoreResult<Vec<StageRun>> {
        let mut stage_runs: Vec<StageRun> = self
            .tables
            .read()
            .stage_runs
            .values()
            .filter(|sr| sr.run_id == run_id)
            .cloned()
            .collect();
        stage_runs.sort_by_key(|sr| sr.stage_order);
        Ok(stage_runs)
    }

    async fn save_run(&self, run: &Run) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.runs.contains_key(&run.id) {
            return Err(StorageError::conflict(format!("run {} does not exist", run.id)));
        }
        self.check_write()?;
        tables.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn save_stage_run(&self, stage_run: &StageRun) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.stage_runs.contains_key(&stage_run.id) {
            return Err(StorageError::conflict(format!(
                "stage run {} does not exist",
                stage_run.id
            )));
        }
        self.check_write()?;
        tables.stage_runs.insert(stage_run.id, stage_run.clone());
        Ok(())
    }

    async fn commit_cancellation(&self, run: &Run, stage_runs: &[StageRun]) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.runs.contains_key(&run.id) {
            return Err(StorageError::conflict(format!("run {} does not exist", run.id)));
        }
        if let Some(missing) = stage_runs
            .iter()
            .find(|sr| sr.run_id != run.id || !tables.stage_runs.contains_key(&sr.id))
        {
            return Err(StorageError::conflict(format!(
                "stage run {} is not part of run {}",
                missing.id, run.id
            )));
        }
        self.check_write()?;

        tables.runs.insert(run.id, run.clone());
        for stage_run in stage_runs {
            tables.stage_runs.insert(stage_run.id, stage_run.clone());
        }
        Ok(())
    }

    async fn mirror_latest_run(
        &self,
        pipeline_id: Uuid,
        run_id: Uuid,
        status: PipelineStatus,
        stage_statuses: &[(Uuid, StageStatus)],
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let is_latest = tables
            .pipelines
            .get(&pipeline_id)
            .is_some_and(|p| p.latest_run_id == Some(run_id));
        if !is_latest {
            return Ok(false);
        }
        self.check_write()?;

        let now = Utc::now();
        if let Some(pipeline) = tables.pipelines.get_mut(&pipeline_id) {
            pipeline.status = status;
            pipeline.updated_at = now;
            for (stage_id, stage_status) in stage_statuses {
                if let Some(stage) = pipeline.stages.iter_mut().find(|s| s.id == *stage_id) {
                    stage.status = *stage_status;
                    stage.updated_at = now;
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TriggerRequest;
    use crate::testing::linear_definition;
    use crate::core::Environment;
    use crate::state_machine::RunStatus;
    use pretty_assertions::assert_eq;

    async fn seeded() -> (InMemoryRunStore, Pipeline) {
        let store = InMemoryRunStore::new();
        let pipeline = Pipeline::from_definition(linear_definition("seeded", 3));
        store.insert_pipeline(pipeline.clone()).await.unwrap();
        (store, pipeline)
    }

    fn new_run(pipeline: &Pipeline) -> (Run, Vec<StageRun>) {
        let run = Run::new(pipeline.id, TriggerRequest::manual(), Environment::Development);
        let now = Utc::now();
        let stage_runs = pipeline
            .stages
            .iter()
            .map(|stage| StageRun::new(run.id, stage, now))
            .collect();
        (run, stage_runs)
    }

    #[tokio::test]
    async fn test_insert_and_get_pipeline() {
        let (store, pipeline) = seeded().await;
        let loaded = store.get_pipeline(pipeline.id).await.unwrap().unwrap();
        assert_eq!(loaded, pipeline);
        assert!(store.get_pipeline(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_pipeline_conflicts() {
        let (store, pipeline) = seeded().await;
        let err = store.insert_pipeline(pipeline).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(store.pipeline_count(), 1);
    }

    #[tokio::test]
    async fn test_insert_run_sets_latest_and_stage_runs() {
        let (store, pipeline) = seeded().await;
        let (run, stage_runs) = new_run(&pipeline);
        store.insert_run(run.clone(), stage_runs).await.unwrap();

        let pipeline = store.get_pipeline(pipeline.id).await.unwrap().unwrap();
        assert_eq!(pipeline.latest_run_id, Some(run.id));
        let loaded = store.get_stage_runs(run.id).await.unwrap();
        assert_eq!(
            loaded.iter().map(|sr| sr.stage_order).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_insert_run_for_missing_pipeline_conflicts() {
        let store = InMemoryRunStore::new();
        let pipeline = Pipeline::from_definition(linear_definition("ghost", 1));
        let (run, stage_runs) = new_run(&pipeline);
        assert!(store.insert_run(run, stage_runs).await.is_err());
        assert_eq!(store.run_count(), 0);
        assert_eq!(store.stage_run_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_store_untouched() {
        let (store, pipeline) = seeded().await;
        store.fail_writes_after(0);

        let (run, stage_runs) = new_run(&pipeline);
        let err = store.insert_run(run.clone(), stage_runs).await.unwrap_err();
        assert!(matches!(err, StorageError::Write(_)));

        assert_eq!(store.run_count(), 0);
        assert_eq!(store.stage_run_count(), 0);
        let pipeline = store.get_pipeline(pipeline.id).await.unwrap().unwrap();
        assert_eq!(pipeline.latest_run_id, None);

        store.heal();
        let (run, stage_runs) = new_run(&pipeline);
        store.insert_run(run, stage_runs).await.unwrap();
        assert_eq!(store.run_count(), 1);
    }

    #[tokio::test]
    async fn test_write_budget_counts_down() {
        let (store, pipeline) = seeded().await;
        let (mut run, stage_runs) = new_run(&pipeline);
        store.insert_run(run.clone(), stage_runs).await.unwrap();

        store.fail_writes_after(1);
        run.notes = Some("first".into());
        store.save_run(&run).await.unwrap();
        run.notes = Some("second".into());
        assert!(store.save_run(&run).await.is_err());

        let stored = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(stored.notes.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_commit_cancellation_is_all_or_nothing() {
        let (store, pipeline) = seeded().await;
        let (mut run, stage_runs) = new_run(&pipeline);
        store.insert_run(run.clone(), stage_runs.clone()).await.unwrap();

        let now = Utc::now();
        run.cancel(now).unwrap();
        let mut cancelled: Vec<StageRun> = stage_runs.clone();
        for sr in &mut cancelled {
            sr.cancel(now).unwrap();
        }

        // A stage-run from another run poisons the whole commit.
        let (_, foreign) = new_run(&pipeline);
        let mut poisoned = cancelled.clone();
        poisoned.push(foreign[0].clone());
        assert!(store.commit_cancellation(&run, &poisoned).await.is_err());
        assert_eq!(
            store.get_run(run.id).await.unwrap().unwrap().status,
            RunStatus::Pending
        );

        store.commit_cancellation(&run, &cancelled).await.unwrap();
        assert_eq!(
            store.get_run(run.id).await.unwrap().unwrap().status,
            RunStatus::Cancelled
        );
        assert!(store
            .get_stage_runs(run.id)
            .await
            .unwrap()
            .iter()
            .all(|sr| sr.status == RunStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_list_runs_newest_first() {
        let (store, pipeline) = seeded().await;
        let (mut older, older_srs) = new_run(&pipeline);
        older.created_at -= chrono::Duration::seconds(10);
        store.insert_run(older.clone(), older_srs).await.unwrap();
        let (newer, newer_srs) = new_run(&pipeline);
        store.insert_run(newer.clone(), newer_srs).await.unwrap();

        let ids: Vec<Uuid> = store
            .list_runs(pipeline.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn test_mirror_only_applies_to_latest_run() {
        let (store, pipeline) = seeded().await;
        let (first, first_srs) = new_run(&pipeline);
        store.insert_run(first.clone(), first_srs).await.unwrap();
        let (second, second_srs) = new_run(&pipeline);
        store.insert_run(second.clone(), second_srs).await.unwrap();

        let stage_id = pipeline.stages[0].id;
        let wrote = store
            .mirror_latest_run(
                pipeline.id,
                first.id,
                PipelineStatus::Failed,
                &[(stage_id, StageStatus::Failed)],
            )
            .await
            .unwrap();
        assert!(!wrote);

        let wrote = store
            .mirror_latest_run(
                pipeline.id,
                second.id,
                PipelineStatus::Completed,
                &[(stage_id, StageStatus::Completed)],
            )
            .await
            .unwrap();
        assert!(wrote);

        let pipeline = store.get_pipeline(pipeline.id).await.unwrap().unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Completed);
        assert_eq!(pipeline.stages[0].status, StageStatus::Completed);
        assert_eq!(pipeline.stages[1].status, StageStatus::Pending);
    }

    #[tokio::test]
    async fn test_delete_pipeline_cascades() {
        let (store, pipeline) = seeded().await;
        let other = Pipeline::from_definition(linear_definition("other", 2));
        store.insert_pipeline(other.clone()).await.unwrap();

        let (run, stage_runs) = new_run(&pipeline);
        store.insert_run(run.clone(), stage_runs).await.unwrap();
        let (other_run, other_srs) = new_run(&other);
        store.insert_run(other_run, other_srs).await.unwrap();

        assert!(store.delete_pipeline(pipeline.id).await.unwrap());
        assert!(!store.delete_pipeline(pipeline.id).await.unwrap());

        assert!(store.get_run(run.id).await.unwrap().is_none());
        assert!(store.get_stage_runs(run.id).await.unwrap().is_empty());
        assert_eq!(store.pipeline_count(), 1);
        assert_eq!(store.run_count(), 1);
        assert_eq!(store.stage_run_count(), 2);
    }
}
