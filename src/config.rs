//! Calculator configuration.

use crate::error::StatError;
use serde::{Deserialize, Serialize};

/// Settings of a [`Calculator`](crate::Calculator).
///
/// Missing fields take their default, unknown fields are rejected.
///
/// # Examples
///
/// ```rust
/// use statgraph::CalculatorConfig;
///
/// let config = CalculatorConfig::from_json(r#"{ "prune_after_update": false }"#).unwrap();
/// assert!(!config.prune_after_update);
///
/// assert_eq!(CalculatorConfig::from_json("{}").unwrap(), CalculatorConfig::default());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalculatorConfig {
    /// Reclaim unused nodes, collections and stat graphs at the end of
    /// every update. When disabled, call
    /// [`Calculator::prune`](crate::Calculator::prune) explicitly.
    pub prune_after_update: bool,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            prune_after_update: true,
        }
    }
}

impl CalculatorConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, StatError> {
        serde_json::from_str(json).map_err(|err| StatError::InvalidConfig(err.to_string()))
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, StatError> {
        Ok(serde_json::to_string(self)?)
    }
}
