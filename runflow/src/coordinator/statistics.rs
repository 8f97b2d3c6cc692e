//! Per-pipeline run statistics.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Run;
use crate::state_machine::RunStatus;

/// Aggregate view over every run of one pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Pipeline the figures describe.
    pub pipeline_id: Uuid,
    /// Number of runs ever triggered.
    pub total_runs: usize,
    /// Runs waiting to start.
    pub pending: usize,
    /// Runs executing now.
    pub running: usize,
    /// Runs that completed.
    pub completed: usize,
    /// Runs that failed.
    pub failed: usize,
    /// Runs that were cancelled.
    pub cancelled: usize,
    /// Completed share of completed plus failed runs; `None` if neither exists.
    pub success_rate: Option<f64>,
    /// Mean execution time over runs that recorded one, in seconds.
    pub average_execution_time: Option<f64>,
    /// Highest memory peak across runs, in MB.
    pub peak_memory_usage: Option<f64>,
    /// Highest CPU peak across runs, in percent.
    pub peak_cpu_usage: Option<f64>,
}

impl RunStatistics {
    /// Summarises `runs` of `pipeline_id`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_runs(pipeline_id: Uuid, runs: &[Run]) -> Self {
        let mut stats = Self {
            pipeline_id,
            total_runs: runs.len(),
            ..Self::default()
        };

        for run in runs {
            match run.status {
                RunStatus::Pending => stats.pending += 1,
                RunStatus::Running => stats.running += 1,
                RunStatus::Completed => stats.completed += 1,
                RunStatus::Failed => stats.failed += 1,
                RunStatus::Cancelled => stats.cancelled += 1,
            }
        }

        let decided = stats.completed + stats.failed;
        if decided > 0 {
            stats.success_rate = Some(stats.completed as f64 / decided as f64);
        }

        let times: Vec<f64> = runs.iter().filter_map(|r| r.execution_time).collect();
        if !times.is_empty() {
            stats.average_execution_time = Some(times.iter().sum::<f64>() / times.len() as f64);
        }

        stats.peak_memory_usage = max_of(runs.iter().filter_map(|r| r.max_memory_usage));
        stats.peak_cpu_usage = max_of(runs.iter().filter_map(|r| r.max_cpu_usage));
        stats
    }

    /// Runs that reached a terminal status.
    #[must_use]
    pub const fn finished(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }
}

fn max_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Environment;
    use crate::models::TriggerRequest;
    use chrono::Utc;

    fn run_with(status: RunStatus, time: Option<f64>, mem: Option<f64>) -> Run {
        let mut run = Run::new(Uuid::nil(), TriggerRequest::manual(), Environment::Development);
        run.status = status;
        run.started_at = Some(Utc::now());
        run.execution_time = time;
        run.max_memory_usage = mem;
        run.max_cpu_usage = mem.map(|m| m / 10.0);
        run
    }

    #[test]
    fn test_empty_statistics() {
        let stats = RunStatistics::from_runs(Uuid::nil(), &[]);
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.success_rate, None);
        assert_eq!(stats.average_execution_time, None);
        assert_eq!(stats.peak_memory_usage, None);
    }

    #[test]
    fn test_counts_and_rates() {
        let runs = vec![
            run_with(RunStatus::Completed, Some(2.0), Some(200.0)),
            run_with(RunStatus::Completed, Some(4.0), Some(450.0)),
            run_with(RunStatus::Failed, Some(3.0), Some(120.0)),
            run_with(RunStatus::Cancelled, None, None),
            run_with(RunStatus::Running, None, None),
        ];
        let stats = RunStatistics::from_runs(Uuid::nil(), &runs);

        assert_eq!(stats.total_runs, 5);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.finished(), 4);
        let rate = stats.success_rate.unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.average_execution_time, Some(3.0));
        assert_eq!(stats.peak_memory_usage, Some(450.0));
        assert_eq!(stats.peak_cpu_usage, Some(45.0));
    }
}
