//! Error types for the policy data model
//!
//! These errors are raised when a tuple is malformed. Engines treat them
//! as configuration errors for the domain that carries the tuple.

use thiserror::Error;

/// Validation failures for policy tuples and permissions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A required field was empty
    #[error("Field `{field}` must not be empty")]
    EmptyField {
        /// Name of the offending field
        field: &'static str,
    },

    /// A field contained control characters or surrounding whitespace
    #[error("Field `{field}` contains invalid characters: {value:?}")]
    InvalidCharacters {
        /// Name of the offending field
        field: &'static str,
        /// The rejected value
        value: String,
    },

    /// A hierarchy edge pointed a role at itself
    #[error("Role `{role}` cannot inherit from itself")]
    SelfInheritance {
        /// The role named on both ends of the edge
        role: String,
    },

    /// A permission string could not be parsed
    #[error("Invalid permission: {0}")]
    InvalidPermission(String),
}

/// Result type for model validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Validate a required identifier field.
pub(crate) fn require(field: &'static str, value: &str) -> ModelResult<()> {
    if value.is_empty() {
        return Err(ModelError::EmptyField { field });
    }
    check_characters(field, value)
}

/// Validate an identifier that may be empty (the domain field).
pub(crate) fn check_characters(field: &'static str, value: &str) -> ModelResult<()> {
    if value.chars().any(char::is_control) || value.trim() != value {
        return Err(ModelError::InvalidCharacters {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
