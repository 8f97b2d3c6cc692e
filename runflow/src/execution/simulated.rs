//! Executor that simulates stage work with random timing and outcomes.

use async_trait::async_trait;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{ExecutionOutcome, StageExecutionRequest, StageExecutor};
use crate::cancellation::CancellationToken;
use crate::config::ExecutorConfig;
use crate::models::ResourceUsage;

/// Sleeps for a random duration, then succeeds with the configured
/// probability and reports random resource usage.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    config: ExecutorConfig,
}

/// The dice rolled up front for one execution.
#[derive(Debug, Clone, Copy)]
struct Plan {
    duration: Duration,
    succeeds: bool,
    resources: ResourceUsage,
}

impl SimulatedExecutor {
    /// Creates an executor with the given parameters.
    #[must_use]
    pub const fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// The executor's parameters.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn plan(&self) -> Plan {
        let c = &self.config;
        let mut rng = rand::thread_rng();
        let duration = rng.gen_range(c.min_duration_secs..=c.max_duration_secs);
        Plan {
            duration: Duration::from_secs_f64(duration),
            succeeds: rng.gen_bool(c.success_rate.clamp(0.0, 1.0)),
            resources: ResourceUsage::new(
                rng.gen_range(c.min_memory_mb..=c.max_memory_mb),
                rng.gen_range(c.min_cpu_percent..=c.max_cpu_percent),
            ),
        }
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

#[async_trait]
impl StageExecutor for SimulatedExecutor {
    async fn execute(
        &self,
        request: &StageExecutionRequest,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome {
        // ThreadRng is not Send; roll everything before the first await.
        let plan = self.plan();
        let started = Instant::now();

        debug!(
            stage = %request.stage_name,
            order = request.order,
            planned_secs = plan.duration.as_secs_f64(),
            "Simulating stage"
        );

        tokio::select! {
            () = tokio::time::sleep(plan.duration) => {}
            () = cancel.cancelled() => {
                return ExecutionOutcome::interrupted(started.elapsed().as_secs_f64());
            }
        }

        let duration_secs = plan.duration.as_secs_f64();
        if plan.succeeds {
            ExecutionOutcome::success(request.success_payload(), duration_secs, plan.resources)
        } else {
            ExecutionOutcome::failure(
                format!("Simulated failure in stage {}", request.stage_name),
                duration_secs,
                plan.resources,
            )
        }
    }
}
