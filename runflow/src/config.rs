//! Engine configuration.
//!
//! Every field has a serde default, so an empty JSON object is a valid
//! configuration. Values can be layered: defaults, then a JSON file, then
//! `RUNFLOW_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::Environment;
use crate::errors::{Result, RunflowError};

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Environment used when a trigger does not name one.
    #[serde(default)]
    pub environment: Environment,
    /// Maximum number of runs executing at once; the rest wait as `PENDING`.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
    /// Runs still going after this many seconds are cancelled. `None` disables.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: Option<u64>,
    /// Stage executor selection and parameters.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_concurrent_runs() -> usize {
    5
}

#[allow(clippy::unnecessary_wraps)]
fn default_run_timeout() -> Option<u64> {
    Some(3600)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            max_concurrent_runs: default_max_concurrent_runs(),
            run_timeout_seconds: default_run_timeout(),
            executor: ExecutorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RunflowError::Config(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RunflowError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Applies `RUNFLOW_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies `RUNFLOW_*` overrides from an arbitrary lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RUNFLOW_ENVIRONMENT") {
            self.environment = value.parse().map_err(RunflowError::Config)?;
        }
        if let Some(value) = lookup("RUNFLOW_MAX_CONCURRENT_RUNS") {
            self.max_concurrent_runs = parse_env("RUNFLOW_MAX_CONCURRENT_RUNS", &value)?;
        }
        if let Some(value) = lookup("RUNFLOW_RUN_TIMEOUT_SECONDS") {
            let value = value.trim();
            self.run_timeout_seconds = if value.is_empty() || value.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_env("RUNFLOW_RUN_TIMEOUT_SECONDS", value)?)
            };
        }
        if let Some(value) = lookup("RUNFLOW_LOG_LEVEL") {
            self.logging.level = value.trim().to_lowercase();
        }
        if let Some(value) = lookup("RUNFLOW_LOG_JSON") {
            self.logging.json = parse_env("RUNFLOW_LOG_JSON", &value.to_lowercase())?;
        }
        if let Some(value) = lookup("RUNFLOW_EXECUTOR") {
            self.executor.kind = match value.trim().to_lowercase().as_str() {
                "simulated" => ExecutorKind::Simulated,
                "instant" => ExecutorKind::Instant,
                other => {
                    return Err(RunflowError::Config(format!(
                        "RUNFLOW_EXECUTOR must be 'simulated' or 'instant' (got '{other}')"
                    )))
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Sets the default environment.
    #[must_use]
    pub const fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Sets the concurrency limit.
    #[must_use]
    pub const fn with_max_concurrent_runs(mut self, limit: usize) -> Self {
        self.max_concurrent_runs = limit;
        self
    }

    /// Sets or disables the run timeout.
    #[must_use]
    pub const fn with_run_timeout(mut self, seconds: Option<u64>) -> Self {
        self.run_timeout_seconds = seconds;
        self
    }

    /// Sets the executor configuration.
    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Run timeout as a Duration.
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_seconds.map(Duration::from_secs)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_runs == 0 {
            return Err(RunflowError::Config(
                "max_concurrent_runs must be at least 1".into(),
            ));
        }
        self.executor.validate()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RunflowError::Config(format!("{key} has an invalid value: '{value}'")))
}

/// Which stage executor the engine uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Sleeps a random duration and succeeds with a configured probability.
    #[default]
    Simulated,
    /// Succeeds immediately.
    Instant,
}

/// Stage executor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Executor implementation.
    #[serde(default)]
    pub kind: ExecutorKind,
    /// Shortest simulated stage, in seconds.
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: f64,
    /// Longest simulated stage, in seconds.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f64,
    /// Probability that a simulated stage succeeds.
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
    /// Lower bound of reported memory, in MB.
    #[serde(default = "default_min_memory")]
    pub min_memory_mb: f64,
    /// Upper bound of reported memory, in MB.
    #[serde(default = "default_max_memory")]
    pub max_memory_mb: f64,
    /// Lower bound of reported CPU, in percent.
    #[serde(default = "default_min_cpu")]
    pub min_cpu_percent: f64,
    /// Upper bound of reported CPU, in percent.
    #[serde(default = "default_max_cpu")]
    pub max_cpu_percent: f64,
}

fn default_min_duration() -> f64 {
    1.0
}

fn default_max_duration() -> f64 {
    5.0
}

fn default_success_rate() -> f64 {
    0.9
}

fn default_min_memory() -> f64 {
    100.0
}

fn default_max_memory() -> f64 {
    500.0
}

fn default_min_cpu() -> f64 {
    20.0
}

fn default_max_cpu() -> f64 {
    80.0
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::default(),
            min_duration_secs: default_min_duration(),
            max_duration_secs: default_max_duration(),
            success_rate: default_success_rate(),
            min_memory_mb: default_min_memory(),
            max_memory_mb: default_max_memory(),
            min_cpu_percent: default_min_cpu(),
            max_cpu_percent: default_max_cpu(),
        }
    }
}

impl ExecutorConfig {
    /// Instant executor.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            kind: ExecutorKind::Instant,
            ..Self::default()
        }
    }

    /// Simulated executor with a custom duration range.
    #[must_use]
    pub fn simulated(min_duration_secs: f64, max_duration_secs: f64) -> Self {
        Self {
            kind: ExecutorKind::Simulated,
            min_duration_secs,
            max_duration_secs,
            ..Self::default()
        }
    }

    /// Sets the success probability.
    #[must_use]
    pub const fn with_success_rate(mut self, rate: f64) -> Self {
        self.success_rate = rate;
        self
    }

    /// Rejects inverted ranges and out-of-range probabilities.
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("duration", self.min_duration_secs, self.max_duration_secs),
            ("memory", self.min_memory_mb, self.max_memory_mb),
            ("cpu", self.min_cpu_percent, self.max_cpu_percent),
        ];
        for (name, min, max) in ranges {
            if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
                return Err(RunflowError::Config(format!(
                    "executor {name} range must satisfy 0 <= min <= max (got {min}..{max})"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err(RunflowError::Config(format!(
                "executor success_rate must be within [0, 1] (got {})",
                self.success_rate
            )));
        }
        Ok(())
    }
}

/// Logging output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.max_concurrent_runs, 5);
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(config.executor.kind, ExecutorKind::Simulated);
        assert!((config.executor.success_rate - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{"environment": "staging", "run_timeout_seconds": null, "executor": {"kind": "instant"}}"#,
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.run_timeout_seconds, None);
        assert_eq!(config.executor.kind, ExecutorKind::Instant);
        assert!((config.executor.max_duration_secs - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_json_values_rejected() {
        assert!(EngineConfig::from_json_str(r#"{"max_concurrent_runs": 0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"executor": {"success_rate": 1.5}}"#).is_err());
        assert!(EngineConfig::from_json_str(
            r#"{"executor": {"min_duration_secs": 3, "max_duration_secs": 1}}"#
        )
        .is_err());
        assert!(EngineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_concurrent_runs": 2, "logging": {{"json": true}}}}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_concurrent_runs, 2);
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::default()
            .with_overrides_from(lookup(&[
                ("RUNFLOW_ENVIRONMENT", "Production"),
                ("RUNFLOW_MAX_CONCURRENT_RUNS", "8"),
                ("RUNFLOW_RUN_TIMEOUT_SECONDS", "none"),
                ("RUNFLOW_LOG_LEVEL", "DEBUG"),
                ("RUNFLOW_LOG_JSON", "TRUE"),
                ("RUNFLOW_EXECUTOR", "instant"),
            ]))
            .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.max_concurrent_runs, 8);
        assert_eq!(config.run_timeout_seconds, None);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.executor.kind, ExecutorKind::Instant);
    }

    #[test]
    fn test_bad_env_overrides() {
        let base = EngineConfig::default;
        assert!(base()
            .with_overrides_from(lookup(&[("RUNFLOW_ENVIRONMENT", "qa")]))
            .is_err());
        assert!(base()
            .with_overrides_from(lookup(&[("RUNFLOW_MAX_CONCURRENT_RUNS", "0")]))
            .is_err());
        assert!(base()
            .with_overrides_from(lookup(&[("RUNFLOW_EXECUTOR", "remote")]))
            .is_err());
    }
}
