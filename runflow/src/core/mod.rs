//! Core domain vocabulary.
//!
//! This module contains the closed sets the rest of the engine matches on:
//! - Stage types and their expected artifact kinds
//! - Trigger types and target environments

mod artifact;
mod stage_type;
mod trigger;

pub use artifact::ArtifactKind;
pub use stage_type::StageType;
pub use trigger::{Environment, TriggerType};

/// Free-form configuration mapping attached to pipelines, stages and runs.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;
