//! Test fixtures for engine testing.

use std::sync::Arc;

use super::ScriptedExecutor;
use crate::config::EngineConfig;
use crate::core::StageType;
use crate::engine::RunEngine;
use crate::errors::Result;
use crate::events::CollectingEventSink;
use crate::models::{PipelineDefinition, StageDefinition};
use crate::storage::InMemoryRunStore;

const LINEAR_TYPES: [StageType; 5] = [
    StageType::DataIngestion,
    StageType::DataPreprocessing,
    StageType::ModelTraining,
    StageType::ModelEvaluation,
    StageType::ModelDeployment,
];

/// A pipeline of `stages` stages named `stage_{i}` with orders `0..stages`,
/// each depending on the one before it.
#[must_use]
pub fn linear_definition(name: &str, stages: usize) -> PipelineDefinition {
    (0..stages).fold(PipelineDefinition::new(name), |def, i| {
        let order = u32::try_from(i).unwrap_or(u32::MAX);
        let stage = StageDefinition::new(
            format!("stage_{i}"),
            LINEAR_TYPES[i % LINEAR_TYPES.len()],
            order,
        );
        let stage = if order == 0 {
            stage
        } else {
            stage.with_dependencies([(order - 1).to_string()])
        };
        def.with_stage(stage)
    })
}

/// An engine wired to an in-memory store, a collecting event sink and a
/// scripted executor, with every part reachable for assertions.
#[derive(Debug, Clone)]
pub struct TestHarness {
    /// The engine under test.
    pub engine: RunEngine,
    /// Its store.
    pub store: Arc<InMemoryRunStore>,
    /// Its event sink.
    pub events: Arc<CollectingEventSink>,
    /// Its executor.
    pub executor: Arc<ScriptedExecutor>,
}

impl TestHarness {
    /// Builds a harness around `executor` with the run timeout disabled.
    pub fn new(executor: ScriptedExecutor) -> Result<Self> {
        Self::with_config(executor, EngineConfig::default().with_run_timeout(None))
    }

    /// Builds a harness around `executor` with `config`.
    pub fn with_config(executor: ScriptedExecutor, config: EngineConfig) -> Result<Self> {
        let store = Arc::new(InMemoryRunStore::new());
        let events = Arc::new(CollectingEventSink::new());
        let executor = Arc::new(executor);
        let engine = RunEngine::builder()
            .with_config(config)
            .with_store(store.clone())
            .with_executor(executor.clone())
            .with_event_sink(events.clone())
            .build()?;
        Ok(Self {
            engine,
            store,
            events,
            executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::validate_definition;

    #[test]
    fn test_linear_definition_is_valid() {
        for n in 1..8 {
            let def = linear_definition("linear", n);
            assert_eq!(def.stages.len(), n);
            assert!(validate_definition(&def).is_ok());
        }
        let def = linear_definition("linear", 3);
        assert_eq!(def.stages[2].dependencies, vec!["1".to_string()]);
        assert_eq!(def.stages[0].stage_type, StageType::DataIngestion);
    }
}
