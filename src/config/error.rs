//! Configuration Error Types

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A source could not be read or parsed, or the merged tree did not deserialize
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Two settings contradict each other
    #[error("Conflicting configuration: {0}")]
    Conflict(String),
}

impl ConfigurationError {
    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

impl From<::config::ConfigError> for ConfigurationError {
    fn from(err: ::config::ConfigError) -> Self {
        ConfigurationError::Load(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
