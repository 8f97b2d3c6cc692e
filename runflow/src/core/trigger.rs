//! Trigger metadata enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What caused a run to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    /// A person asked for it.
    #[default]
    Manual,
    /// A scheduler fired.
    Scheduled,
    /// A programmatic API call.
    Api,
    /// An inbound webhook.
    Webhook,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "MANUAL"),
            Self::Scheduled => write!(f, "SCHEDULED"),
            Self::Api => write!(f, "API"),
            Self::Webhook => write!(f, "WEBHOOK"),
        }
    }
}

/// Target environment tag of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local or shared development.
    #[default]
    Development,
    /// Pre-production.
    Staging,
    /// Production.
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "Environment must be one of: development, staging, production (got '{other}')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_type_default_manual() {
        assert_eq!(TriggerType::default(), TriggerType::Manual);
        assert_eq!(serde_json::to_string(&TriggerType::Webhook).unwrap(), r#""WEBHOOK""#);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("Staging".parse::<Environment>().unwrap(), Environment::Staging);
        assert!("qa".parse::<Environment>().is_err());
        assert_eq!(Environment::default().to_string(), "development");
    }
}
