//! Artifact kinds a stage may produce.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of artifact a stage produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    /// A trained model.
    Model,
    /// A dataset or dataset split.
    Dataset,
    /// Numeric metrics.
    Metrics,
    /// A chart or figure.
    Plot,
    /// Execution logs.
    Log,
    /// Configuration produced for later stages.
    Config,
    /// A human-readable report.
    Report,
    /// Anything else.
    Other,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => write!(f, "MODEL"),
            Self::Dataset => write!(f, "DATASET"),
            Self::Metrics => write!(f, "METRICS"),
            Self::Plot => write!(f, "PLOT"),
            Self::Log => write!(f, "LOG"),
            Self::Config => write!(f, "CONFIG"),
            Self::Report => write!(f, "REPORT"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_kind_display_matches_serde() {
        let kind = ArtifactKind::Dataset;
        assert_eq!(kind.to_string(), "DATASET");
        assert_eq!(serde_json::to_string(&kind).unwrap(), r#""DATASET""#);
    }
}
