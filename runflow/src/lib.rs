//! # Runflow
//!
//! A run-orchestration engine for dependency-linked, multi-stage pipelines.
//!
//! Runflow provides:
//!
//! - **Definition-time validation**: stage orders are unique and dependencies
//!   only point at earlier orders, so every accepted pipeline is a DAG
//! - **Run lifecycle**: an explicit state machine for runs and stage-runs
//! - **Detached coordination**: each trigger returns at once while a
//!   background coordinator executes stages in ascending order, fail-fast
//! - **Cooperative cancellation**: cancelled runs stop starting stages, and
//!   executors are signalled to abort the one in flight
//! - **Pluggable execution and storage**: the unit of work and the record
//!   store are traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use runflow::prelude::*;
//!
//! let engine = RunEngine::from_config(EngineConfig::default())?;
//!
//! let pipeline = engine
//!     .validate_and_create_pipeline(
//!         PipelineDefinition::new("train")
//!             .with_stage(StageDefinition::new("ingest", StageType::DataIngestion, 0))
//!             .with_stage(
//!                 StageDefinition::new("fit", StageType::ModelTraining, 1)
//!                     .with_dependencies(["0"]),
//!             ),
//!     )
//!     .await?;
//!
//! let run = engine.trigger_run(pipeline.id, TriggerRequest::manual()).await?;
//! let details = engine.wait_for_run(pipeline.id, run.id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod execution;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod state_machine;
pub mod storage;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{EngineConfig, ExecutorConfig, ExecutorKind, LoggingConfig};
    pub use crate::coordinator::{RunMetrics, RunStatistics};
    pub use crate::core::{ArtifactKind, ConfigMap, Environment, StageType, TriggerType};
    pub use crate::engine::{EngineBuilder, RunEngine};
    pub use crate::errors::{
        ErrorKind, NotFoundError, PipelineValidationError, RunflowError, StorageError,
    };
    pub use crate::events::{EngineEvent, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::execution::{
        ExecutionFailure, ExecutionOutcome, StageExecutionRequest, StageExecutor,
    };
    pub use crate::models::{
        Pipeline, PipelineDefinition, ResourceUsage, Run, RunDetails, Stage, StageDefinition,
        StageRun, TriggerRequest,
    };
    pub use crate::observability::init_logging;
    pub use crate::state_machine::{PipelineStatus, RunStatus, StageStatus};
    pub use crate::storage::{InMemoryRunStore, RunStore};
}
