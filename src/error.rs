//! Error types for stat and modifier construction.
//!
//! The calculation graph itself never fails: `Calculator::update` accepts any
//! well-typed modifier. Errors are raised earlier, while stats, modifiers and
//! configuration are being built.

use crate::stat::DataType;
use thiserror::Error;

/// Errors that can occur while building stats, modifiers or configuration.
///
/// # Examples
///
/// ```rust
/// use statgraph::StatError;
///
/// let err = StatError::SingleStatRequired { found: 2 };
/// assert_eq!(err.to_string(), "Expected exactly one stat, found 2");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatError {
    /// A stat was re-defined with properties that differ from the
    /// already interned definition.
    #[error("Conflicting definition for stat {stat}: {existing:?} already interned, {requested:?} requested")]
    ConflictingDefinition {
        stat: String,
        existing: DataType,
        requested: DataType,
    },

    /// A stat was re-defined with a different explicit registration.
    #[error("Conflicting explicit registration for stat {0}")]
    ConflictingRegistration(String),

    /// A modifier must target at least one stat.
    #[error("Modifier must target at least one stat")]
    EmptyStatSet,

    /// A value expression required exactly one stat.
    #[error("Expected exactly one stat, found {found}")]
    SingleStatRequired { found: usize },

    /// Calculator configuration could not be parsed.
    #[error("Invalid calculator configuration: {0}")]
    InvalidConfig(String),

    /// A diagnostic snapshot could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StatError {
    fn from(err: serde_json::Error) -> Self {
        StatError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StatError::EmptyStatSet;
        assert!(err.to_string().contains("at least one stat"));
    }

    #[test]
    fn test_conflicting_definition_display() {
        let err = StatError::ConflictingDefinition {
            stat: String::from("Life"),
            existing: DataType::Double,
            requested: DataType::Int,
        };
        let display = err.to_string();
        assert!(display.contains("Life"));
        assert!(display.contains("Double"));
        assert!(display.contains("Int"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = StatError::from(json_err);
        assert!(matches!(err, StatError::Serialization(_)));
    }
}
