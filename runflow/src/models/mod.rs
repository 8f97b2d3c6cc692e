//! Durable records: pipelines, stages, runs and stage-runs.

mod pipeline;
mod run;

pub use pipeline::{Pipeline, PipelineDefinition, Stage, StageDefinition};
pub use run::{seconds_between, ResourceUsage, Run, RunDetails, StageRun, TriggerRequest};
