//! Pipeline and stage records, and the definitions they are created from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{ConfigMap, StageType};
use crate::state_machine::{PipelineStatus, StageStatus};

/// A proposed stage, as submitted when defining a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Display name.
    pub name: String,
    /// Stage type tag.
    pub stage_type: StageType,
    /// Required when `stage_type` is [`StageType::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    /// Position in the declared sequence; unique within the pipeline.
    pub order: u32,
    /// Stage configuration handed to the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigMap>,
    /// Orders of the stages this one depends on, as strings.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl StageDefinition {
    /// Creates a definition with no config and no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, stage_type: StageType, order: u32) -> Self {
        Self {
            name: name.into(),
            stage_type,
            custom_name: None,
            order,
            config: None,
            dependencies: Vec::new(),
        }
    }

    /// Sets the custom name.
    #[must_use]
    pub fn with_custom_name(mut self, custom_name: impl Into<String>) -> Self {
        self.custom_name = Some(custom_name.into());
        self
    }

    /// Sets the stage configuration.
    #[must_use]
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the dependency references.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// A proposed pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Opaque pipeline-level configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigMap>,
    /// Proposed stages, in any order.
    pub stages: Vec<StageDefinition>,
}

impl PipelineDefinition {
    /// Creates a definition with no stages.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            config: None,
            stages: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the pipeline configuration.
    #[must_use]
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = Some(config);
        self
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: StageDefinition) -> Self {
        self.stages.push(stage);
        self
    }
}

/// A persisted stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage identity.
    pub id: Uuid,
    /// Owning pipeline.
    pub pipeline_id: Uuid,
    /// Display name.
    pub name: String,
    /// Stage type tag.
    pub stage_type: StageType,
    /// Custom name for custom stages.
    pub custom_name: Option<String>,
    /// Position in the declared sequence.
    pub order: u32,
    /// Stage configuration.
    pub config: Option<ConfigMap>,
    /// Orders of upstream stages, as declared.
    pub dependencies: Vec<String>,
    /// Status as of the pipeline's latest run.
    pub status: StageStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Stage {
    /// Materialises a validated definition under `pipeline_id`.
    #[must_use]
    pub fn from_definition(pipeline_id: Uuid, def: StageDefinition, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            name: def.name,
            stage_type: def.stage_type,
            custom_name: def.custom_name,
            order: def.order,
            config: def.config,
            dependencies: def.dependencies,
            status: StageStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Name shown in messages: the custom name for custom stages.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match (&self.custom_name, self.stage_type.is_custom()) {
            (Some(custom), true) => custom,
            _ => &self.name,
        }
    }
}

/// A persisted pipeline with its stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline identity.
    pub id: Uuid,
    /// Pipeline name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Opaque configuration.
    pub config: Option<ConfigMap>,
    /// Mirrors the latest run.
    pub status: PipelineStatus,
    /// Stages sorted by ascending order.
    pub stages: Vec<Stage>,
    /// The most recently triggered run, if any.
    pub latest_run_id: Option<Uuid>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// Materialises a validated definition.
    #[must_use]
    pub fn from_definition(def: PipelineDefinition) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut stages: Vec<Stage> = def
            .stages
            .into_iter()
            .map(|s| Stage::from_definition(id, s, now))
            .collect();
        stages.sort_by_key(|s| s.order);

        Self {
            id,
            name: def.name,
            description: def.description,
            config: def.config,
            status: PipelineStatus::Pending,
            stages,
            latest_run_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Looks up a stage by identity.
    #[must_use]
    pub fn stage(&self, stage_id: Uuid) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_from_definition_sorts_stages() {
        let def = PipelineDefinition::new("training")
            .with_stage(StageDefinition::new("train", StageType::ModelTraining, 2))
            .with_stage(StageDefinition::new("ingest", StageType::DataIngestion, 0))
            .with_stage(StageDefinition::new("prep", StageType::DataPreprocessing, 1));

        let pipeline = Pipeline::from_definition(def);

        let orders: Vec<u32> = pipeline.stages.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(pipeline.stages.iter().all(|s| s.pipeline_id == pipeline.id));
        assert_eq!(pipeline.status, PipelineStatus::Pending);
        assert_eq!(pipeline.latest_run_id, None);
    }

    #[test]
    fn test_display_name_prefers_custom() {
        let def = StageDefinition::new("step", StageType::Custom, 0).with_custom_name("bespoke");
        let stage = Stage::from_definition(Uuid::new_v4(), def, Utc::now());
        assert_eq!(stage.display_name(), "bespoke");

        let def = StageDefinition::new("ingest", StageType::DataIngestion, 0).with_custom_name("ignored");
        let stage = Stage::from_definition(Uuid::new_v4(), def, Utc::now());
        assert_eq!(stage.display_name(), "ingest");
    }

    #[test]
    fn test_stage_definition_deserialize_defaults() {
        let def: StageDefinition = serde_json::from_value(serde_json::json!({
            "name": "ingest",
            "stage_type": "DATA_INGESTION",
            "order": 0
        }))
        .unwrap();

        assert!(def.dependencies.is_empty());
        assert_eq!(def.custom_name, None);
    }
}
