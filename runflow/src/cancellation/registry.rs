//! Registry of in-flight runs.
//!
//! Every triggered run owns a handle here from trigger until its coordinator
//! exits. The handle carries the run's cancellation token, the write lock
//! that serialises the coordinator and the cancel path, and a completion
//! signal for waiters.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::CancellationToken;

/// Shared view of one in-flight run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    /// Owning pipeline.
    pub pipeline_id: Uuid,
    /// Cancellation token handed to the executor.
    pub token: Arc<CancellationToken>,
    /// Held while a writer inspects and updates the run's records.
    pub write_lock: Arc<Mutex<()>>,
    done: watch::Receiver<bool>,
}

impl RunHandle {
    /// Completes once the run's coordinator has exited.
    pub async fn wait_done(&self) {
        let mut done = self.done.clone();
        // A dropped sender also means the coordinator is gone.
        let _ = done.wait_for(|finished| *finished).await;
    }

    /// Whether the coordinator has already exited.
    #[must_use]
    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }
}

#[derive(Debug)]
struct RunEntry {
    handle: RunHandle,
    done_tx: watch::Sender<bool>,
}

/// Concurrent map from run id to its in-flight handle.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: DashMap<Uuid, RunEntry>,
}

impl RunRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly triggered run and returns its handle.
    pub fn register(&self, run_id: Uuid, pipeline_id: Uuid) -> RunHandle {
        let (done_tx, done) = watch::channel(false);
        let handle = RunHandle {
            pipeline_id,
            token: Arc::new(CancellationToken::new()),
            write_lock: Arc::new(Mutex::new(())),
            done,
        };
        self.runs.insert(
            run_id,
            RunEntry {
                handle: handle.clone(),
                done_tx,
            },
        );
        handle
    }

    /// Returns the handle of an in-flight run.
    #[must_use]
    pub fn get(&self, run_id: Uuid) -> Option<RunHandle> {
        self.runs.get(&run_id).map(|entry| entry.handle.clone())
    }

    /// Removes a run and wakes everything waiting on it.
    pub fn finish(&self, run_id: Uuid) {
        if let Some((_, entry)) = self.runs.remove(&run_id) {
            let _ = entry.done_tx.send(true);
        }
    }

    /// In-flight runs belonging to `pipeline_id`.
    #[must_use]
    pub fn runs_for_pipeline(&self, pipeline_id: Uuid) -> Vec<(Uuid, RunHandle)> {
        self.runs
            .iter()
            .filter(|entry| entry.handle.pipeline_id == pipeline_id)
            .map(|entry| (*entry.key(), entry.handle.clone()))
            .collect()
    }

    /// Ids of every in-flight run.
    #[must_use]
    pub fn active_ids(&self) -> Vec<Uuid> {
        self.runs.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of in-flight runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no run is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Removes a run from the registry when dropped, including on panic.
#[derive(Debug)]
pub struct RunGuard {
    registry: Arc<RunRegistry>,
    run_id: Uuid,
}

impl RunGuard {
    /// Creates a guard for `run_id`.
    #[must_use]
    pub const fn new(registry: Arc<RunRegistry>, run_id: Uuid) -> Self {
        Self { registry, run_id }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.finish(self.run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_register_and_get() {
        let registry = RunRegistry::new();
        let (run_id, pipeline_id) = (Uuid::new_v4(), Uuid::new_v4());

        let handle = registry.register(run_id, pipeline_id);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(run_id).unwrap().pipeline_id, pipeline_id);
        assert!(!handle.is_done());
        assert!(registry.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_handles_share_token() {
        let registry = RunRegistry::new();
        let run_id = Uuid::new_v4();
        let handle = registry.register(run_id, Uuid::new_v4());

        registry.get(run_id).unwrap().token.cancel("stop");
        assert!(handle.token.is_cancelled());
    }

    #[test]
    fn test_runs_for_pipeline() {
        let registry = RunRegistry::new();
        let pipeline_a = Uuid::new_v4();
        let run_a1 = Uuid::new_v4();
        registry.register(run_a1, pipeline_a);
        registry.register(Uuid::new_v4(), Uuid::new_v4());

        let runs = registry.runs_for_pipeline(pipeline_a);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].0, run_a1);
        assert_eq!(registry.active_ids().len(), 2);
    }

    #[tokio::test]
    async fn test_guard_drop_finishes_run() {
        let registry = Arc::new(RunRegistry::new());
        let run_id = Uuid::new_v4();
        let handle = registry.register(run_id, Uuid::new_v4());

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_done().await })
        };

        drop(RunGuard::new(registry.clone(), run_id));

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(handle.is_done());
        assert!(registry.is_empty());
    }
}
