//! Error types for schema registration, merging, validation, and access.

use crate::validate::ViolationReport;
use thiserror::Error;

/// Errors returned by the hyperparameter configuration APIs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A schema is missing, malformed, or registered twice with different content.
    #[error("schema error: {0}")]
    Schema(String),
    /// A non-extensible schema received keys it does not declare.
    #[error("unknown hyperparameter keys: {}", .paths.join(", "))]
    UnknownKeys { paths: Vec<String> },
    /// The merged config does not conform to its schema.
    #[error("invalid hyperparameters:\n{0}")]
    Validation(ViolationReport),
    /// A write was attempted on a frozen config.
    #[error("config is immutable; cannot modify {path}")]
    Immutable { path: String },
    /// A lookup path does not exist in the config.
    #[error("no hyperparameter at {path}")]
    KeyNotFound { path: String },
    /// A specific field has the wrong shape or kind.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// Reading a config file failed.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// Parsing a config file failed.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    /// Converting JSON values failed.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
}

impl ConfigError {
    /// Build a structured invalid-field error.
    pub(crate) fn invalid_field(path: &str, message: impl Into<String>) -> Self {
        let path = if path.is_empty() { "root" } else { path };
        ConfigError::InvalidField {
            path: path.to_string(),
            message: message.into(),
        }
    }
}
