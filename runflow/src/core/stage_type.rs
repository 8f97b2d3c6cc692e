//! Stage type tags and the kinds of artifacts each one produces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ArtifactKind;

/// The closed set of stage types a pipeline may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageType {
    // Data stages
    /// Pull raw data in.
    DataIngestion,
    /// Check data quality.
    DataValidation,
    /// Clean and normalise data.
    DataPreprocessing,
    /// Derive features.
    FeatureEngineering,
    /// Split into train/validation/test sets.
    DataSplitting,

    // Model stages
    /// Fit a model.
    ModelTraining,
    /// Validate a fitted model.
    ModelValidation,
    /// Evaluate a model against held-out data.
    ModelEvaluation,
    /// Test a model.
    ModelTesting,

    // Deployment stages
    /// Register a model in a registry.
    ModelRegistration,
    /// Deploy a model.
    ModelDeployment,
    /// Monitor a deployed model.
    ModelMonitoring,

    // Analysis stages
    /// Exploratory analysis.
    ExploratoryDataAnalysis,
    /// Search hyperparameters.
    HyperparameterTuning,
    /// Compare candidate models.
    ModelComparison,

    // Infrastructure stages
    /// Prepare an execution environment.
    EnvironmentSetup,
    /// Acquire compute or storage.
    ResourceProvisioning,
    /// Release resources.
    Cleanup,

    /// User-defined stage; requires a custom name.
    Custom,
}

impl StageType {
    /// Every stage type, in declaration order.
    pub const ALL: [Self; 19] = [
        Self::DataIngestion,
        Self::DataValidation,
        Self::DataPreprocessing,
        Self::FeatureEngineering,
        Self::DataSplitting,
        Self::ModelTraining,
        Self::ModelValidation,
        Self::ModelEvaluation,
        Self::ModelTesting,
        Self::ModelRegistration,
        Self::ModelDeployment,
        Self::ModelMonitoring,
        Self::ExploratoryDataAnalysis,
        Self::HyperparameterTuning,
        Self::ModelComparison,
        Self::EnvironmentSetup,
        Self::ResourceProvisioning,
        Self::Cleanup,
        Self::Custom,
    ];

    /// Returns true for the custom stage type.
    #[must_use]
    pub const fn is_custom(self) -> bool {
        matches!(self, Self::Custom)
    }

    /// The artifact kinds a stage of this type typically produces.
    ///
    /// Descriptive only; nothing enforces that a stage actually emits them.
    #[must_use]
    pub const fn expected_artifacts(self) -> &'static [ArtifactKind] {
        use ArtifactKind::{Config, Dataset, Log, Metrics, Model, Plot, Report};

        match self {
            Self::DataIngestion => &[Dataset, Log],
            Self::DataValidation => &[Report, Metrics, Log],
            Self::DataPreprocessing => &[Dataset, Config, Log],
            Self::FeatureEngineering => &[Dataset, Config, Metrics],
            Self::DataSplitting => &[Dataset, Config],
            Self::ModelTraining => &[Model, Metrics, Log, Config],
            Self::ModelValidation | Self::ModelEvaluation => &[Metrics, Report, Plot],
            Self::ModelTesting | Self::ModelMonitoring => &[Metrics, Report, Log],
            Self::ModelRegistration => &[Model, Config, Report],
            Self::ModelDeployment => &[Config, Log, Metrics],
            Self::ExploratoryDataAnalysis => &[Report, Plot, Metrics],
            Self::HyperparameterTuning => &[Model, Metrics, Config],
            Self::ModelComparison => &[Report, Metrics, Plot],
            Self::EnvironmentSetup | Self::ResourceProvisioning => &[Config, Log],
            Self::Cleanup | Self::Custom => &[Log],
        }
    }

    /// The wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataIngestion => "DATA_INGESTION",
            Self::DataValidation => "DATA_VALIDATION",
            Self::DataPreprocessing => "DATA_PREPROCESSING",
            Self::FeatureEngineering => "FEATURE_ENGINEERING",
            Self::DataSplitting => "DATA_SPLITTING",
            Self::ModelTraining => "MODEL_TRAINING",
            Self::ModelValidation => "MODEL_VALIDATION",
            Self::ModelEvaluation => "MODEL_EVALUATION",
            Self::ModelTesting => "MODEL_TESTING",
            Self::ModelRegistration => "MODEL_REGISTRATION",
            Self::ModelDeployment => "MODEL_DEPLOYMENT",
            Self::ModelMonitoring => "MODEL_MONITORING",
            Self::ExploratoryDataAnalysis => "EXPLORATORY_DATA_ANALYSIS",
            Self::HyperparameterTuning => "HYPERPARAMETER_TUNING",
            Self::ModelComparison => "MODEL_COMPARISON",
            Self::EnvironmentSetup => "ENVIRONMENT_SETUP",
            Self::ResourceProvisioning => "RESOURCE_PROVISIONING",
            Self::Cleanup => "CLEANUP",
            Self::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Invalid stage type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_artifacts() {
        assert_eq!(
            StageType::ModelTraining.expected_artifacts(),
            &[
                ArtifactKind::Model,
                ArtifactKind::Metrics,
                ArtifactKind::Log,
                ArtifactKind::Config
            ]
        );
    }

    #[test]
    fn test_every_type_expects_something() {
        for stage_type in StageType::ALL {
            assert!(!stage_type.expected_artifacts().is_empty(), "{stage_type}");
        }
    }

    #[test]
    fn test_custom_only_logs() {
        assert!(StageType::Custom.is_custom());
        assert_eq!(StageType::Custom.expected_artifacts(), &[ArtifactKind::Log]);
    }

    #[test]
    fn test_serde_matches_as_str() {
        for stage_type in StageType::ALL {
            let json = serde_json::to_string(&stage_type).unwrap();
            assert_eq!(json, format!("\"{}\"", stage_type.as_str()));
            assert_eq!(stage_type.as_str().parse::<StageType>().unwrap(), stage_type);
        }
    }
}
