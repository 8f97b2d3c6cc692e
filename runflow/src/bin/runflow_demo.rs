//! Runs a sample training pipeline through the engine and prints the result.
//!
//! Configuration is read from the JSON file named by `RUNFLOW_CONFIG`, if
//! set, then overridden by `RUNFLOW_*` variables.

use anyhow::{Context, Result};
use tracing::info;

use runflow::prelude::*;

fn sample_pipeline() -> PipelineDefinition {
    PipelineDefinition::new("demo-training")
        .with_description("Ingest, prepare, train and evaluate a model")
        .with_stage(StageDefinition::new("ingest", StageType::DataIngestion, 0))
        .with_stage(
            StageDefinition::new("prepare", StageType::DataPreprocessing, 1).with_dependencies(["0"]),
        )
        .with_stage(
            StageDefinition::new("train", StageType::ModelTraining, 2).with_dependencies(["1"]),
        )
        .with_stage(
            StageDefinition::new("evaluate", StageType::ModelEvaluation, 3)
                .with_dependencies(["2"]),
        )
        .with_stage(
            StageDefinition::new("report", StageType::Custom, 4)
                .with_custom_name("publish-report")
                .with_dependencies(["2", "3"]),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::var("RUNFLOW_CONFIG") {
        Ok(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        Err(_) => EngineConfig::default(),
    }
    .with_env_overrides()
    .context("applying environment overrides")?;

    init_logging(&config.logging);

    let engine = RunEngine::builder()
        .with_config(config)
        .with_event_sink(std::sync::Arc::new(LoggingEventSink::default()))
        .build()
        .context("building engine")?;

    let pipeline = engine
        .validate_and_create_pipeline(sample_pipeline())
        .await
        .context("creating pipeline")?;

    let run = engine
        .trigger_run(
            pipeline.id,
            TriggerRequest::manual()
                .triggered_by("runflow-demo")
                .with_tag("demo"),
        )
        .await
        .context("triggering run")?;
    info!(run_id = %run.id, "Waiting for run");

    let details = engine.wait_for_run(pipeline.id, run.id).await?;
    println!("{}", serde_json::to_string_pretty(&details)?);

    let stats = engine.run_statistics(pipeline.id).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    engine.shutdown().await;
    Ok(())
}
