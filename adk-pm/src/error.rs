//! Error types for the product-management pipeline.

use crate::models::Stage;
use crate::models::config::ValidationError;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PmError>;

/// Errors that can occur in the pipeline.
///
/// Stage failures and publish failures are normally absorbed by the
/// orchestrator and reported through `WorkflowResult::status`; only caller
/// mistakes and storage problems escape `run_workflow` as `Err`.
#[derive(Debug, Error)]
pub enum PmError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration validation error with detailed context
    #[error("Configuration validation error: {0}")]
    ConfigValidation(#[from] ValidationError),

    /// A stage was asked to run before its upstream artifacts exist.
    #[error("Stage '{stage}' is missing upstream artifacts: {}", format_stages(.missing))]
    MissingDependency { stage: Stage, missing: Vec<Stage> },

    /// A stage executor failed while producing its artifact
    #[error("Stage '{stage}' failed: {message}")]
    StageExecution { stage: Stage, message: String },

    /// No executor is registered for a stage
    #[error("No executor registered for stage '{0}'")]
    ExecutorNotRegistered(Stage),

    /// Publishing to an external system failed
    #[error("Publish error ({target}): {message}")]
    Publish { target: String, message: String },

    /// Unknown session id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Invalid workflow input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("File error ({path}): {message}")]
    File { path: String, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_stages(stages: &[Stage]) -> String {
    stages.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}

impl PmError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        PmError::Configuration(msg.into())
    }

    /// Create a stage execution error.
    pub fn stage(stage: Stage, msg: impl Into<String>) -> Self {
        PmError::StageExecution {
            stage,
            message: msg.into(),
        }
    }

    /// Create a publish error.
    pub fn publish(target: impl Into<String>, msg: impl Into<String>) -> Self {
        PmError::Publish {
            target: target.into(),
            message: msg.into(),
        }
    }

    /// Create a file error.
    pub fn file(path: impl Into<String>, msg: impl Into<String>) -> Self {
        PmError::File {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a missing dependency error.
    pub fn missing_dependency(stage: Stage, missing: Vec<Stage>) -> Self {
        PmError::MissingDependency { stage, missing }
    }

    /// Whether this error is a sequencing bug rather than a runtime failure.
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, PmError::MissingDependency { .. })
    }
}

impl From<std::io::Error> for PmError {
    fn from(err: std::io::Error) -> Self {
        PmError::File {
            path: "unknown".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PmError {
    fn from(err: serde_json::Error) -> Self {
        PmError::Serialization(err.to_string())
    }
}
