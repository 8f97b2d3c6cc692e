//! Roll-up of per-stage resource usage into run-level peaks.

use crate::models::{Run, StageRun};

/// Peak resource usage across a run's stage-runs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunMetrics {
    /// Highest memory figure, in MB.
    pub max_memory_usage: Option<f64>,
    /// Highest CPU figure, in percent.
    pub max_cpu_usage: Option<f64>,
}

impl RunMetrics {
    /// Computes peaks over `stage_runs`, counting a missing figure as zero.
    ///
    /// Both peaks are `None` only when there are no stage-runs at all.
    #[must_use]
    pub fn aggregate(stage_runs: &[StageRun]) -> Self {
        if stage_runs.is_empty() {
            return Self::default();
        }
        let peak = |value: fn(&StageRun) -> Option<f64>| {
            stage_runs
                .iter()
                .map(|sr| value(sr).unwrap_or(0.0))
                .fold(0.0_f64, f64::max)
        };
        Self {
            max_memory_usage: Some(peak(|sr| sr.memory_usage)),
            max_cpu_usage: Some(peak(|sr| sr.cpu_usage)),
        }
    }

    /// Writes the peaks onto `run`.
    pub fn apply_to(self, run: &mut Run) {
        run.max_memory_usage = self.max_memory_usage;
        run.max_cpu_usage = self.max_cpu_usage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pipeline, ResourceUsage};
    use crate::testing::linear_definition;
    use chrono::Utc;
    use uuid::Uuid;

    fn stage_runs(usages: &[Option<(f64, f64)>]) -> Vec<StageRun> {
        let pipeline = Pipeline::from_definition(linear_definition("m", usages.len()));
        let run_id = Uuid::new_v4();
        let now = Utc::now();
        pipeline
            .stages
            .iter()
            .zip(usages)
            .map(|(stage, usage)| {
                let mut sr = StageRun::new(run_id, stage, now);
                if let Some((mem, cpu)) = usage {
                    sr.start(now).unwrap();
                    sr.complete(serde_json::json!({}), 1.0, ResourceUsage::new(*mem, *cpu), now)
                        .unwrap();
                }
                sr
            })
            .collect()
    }

    #[test]
    fn test_peaks_are_per_metric() {
        let runs = stage_runs(&[Some((120.0, 75.0)), Some((480.0, 22.0)), Some((300.0, 50.0))]);
        let metrics = RunMetrics::aggregate(&runs);
        assert_eq!(metrics.max_memory_usage, Some(480.0));
        assert_eq!(metrics.max_cpu_usage, Some(75.0));
    }

    #[test]
    fn test_missing_values_count_as_zero() {
        let runs = stage_runs(&[None, Some((150.0, 30.0)), None]);
        let metrics = RunMetrics::aggregate(&runs);
        assert_eq!(metrics.max_memory_usage, Some(150.0));
        assert_eq!(metrics.max_cpu_usage, Some(30.0));

        let untouched = stage_runs(&[None, None]);
        assert_eq!(RunMetrics::aggregate(&untouched).max_memory_usage, Some(0.0));
    }

    #[test]
    fn test_empty_has_no_peaks() {
        assert_eq!(RunMetrics::aggregate(&[]), RunMetrics::default());
    }
}
