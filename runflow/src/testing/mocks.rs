//! Scripted stage executor for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Notify;

use crate::cancellation::CancellationToken;
use crate::execution::{ExecutionOutcome, StageExecutionRequest, StageExecutor};
use crate::models::ResourceUsage;

/// How the executor behaves for one stage order.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Script {
    Succeed,
    Fail,
    /// Runs until the run is cancelled.
    Block,
    /// Sleeps, ignoring cancellation, then succeeds.
    Stubborn(Duration),
}

/// An executor whose behaviour is fixed per stage order.
///
/// Stages succeed unless scripted otherwise. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<u32, Script>,
    resources: HashMap<u32, ResourceUsage>,
    delay: Duration,
    calls: Mutex<Vec<u32>>,
    called: Notify,
}

impl ScriptedExecutor {
    /// Creates an executor on which every stage succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the stage with `order` fail.
    #[must_use]
    pub fn failing_at(mut self, order: u32) -> Self {
        self.scripts.insert(order, Script::Fail);
        self
    }

    /// Makes the stage with `order` run until its run is cancelled.
    #[must_use]
    pub fn blocking_at(mut self, order: u32) -> Self {
        self.scripts.insert(order, Script::Block);
        self
    }

    /// Makes the stage with `order` ignore cancellation and succeed after
    /// `delay`.
    #[must_use]
    pub fn stubborn_at(mut self, order: u32, delay: Duration) -> Self {
        self.scripts.insert(order, Script::Stubborn(delay));
        self
    }

    /// Reports these resource figures for the stage with `order`.
    #[must_use]
    pub fn with_resources(mut self, order: u32, memory_mb: f64, cpu_percent: f64) -> Self {
        self.resources
            .insert(order, ResourceUsage::new(memory_mb, cpu_percent));
        self
    }

    /// Sleeps this long (honouring cancellation) before every outcome.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Orders of the stages executed so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().clone()
    }

    /// Number of stages executed so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Completes once at least `n` stages have been handed to the executor.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.called.notified();
            if self.call_count() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl StageExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        request: &StageExecutionRequest,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome {
        self.calls.lock().push(request.order);
        self.called.notify_waiters();

        let script = self
            .scripts
            .get(&request.order)
            .copied()
            .unwrap_or(Script::Succeed);
        let resources = self
            .resources
            .get(&request.order)
            .copied()
            .unwrap_or_default();

        if !self.delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(self.delay) => {}
                () = cancel.cancelled() => return ExecutionOutcome::interrupted(0.0),
            }
        }

        let duration_secs = self.delay.as_secs_f64();
        match script {
            Script::Succeed => {
                ExecutionOutcome::success(request.success_payload(), duration_secs, resources)
            }
            Script::Fail => ExecutionOutcome::failure(
                format!("Scripted failure in stage {}", request.stage_name),
                duration_secs,
                resources,
            ),
            Script::Block => {
                cancel.cancelled().await;
                ExecutionOutcome::interrupted(duration_secs)
            }
            Script::Stubborn(delay) => {
                tokio::time::sleep(delay).await;
                ExecutionOutcome::success(request.success_payload(), delay.as_secs_f64(), resources)
            }
        }
    }
}
