//! Error handling module for nbrollout
//!
//! Library code returns `RolloutError`; the binary and the executor layer
//! wrap these with `anyhow` context.

use thiserror::Error;

/// Main error type for nbrollout
#[derive(Error, Debug)]
pub enum RolloutError {
    /// IO errors (config file, terminal, output directories)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prompt errors (unknown question field, empty choice list, aborted input)
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Validation errors (missing answers, malformed date)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Notebook execution errors
    #[error("Stage {stage} failed: {message}")]
    Stage { stage: String, message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for nbrollout operations
pub type Result<T> = std::result::Result<T, RolloutError>;

impl RolloutError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a prompt error
    pub fn prompt(msg: impl Into<String>) -> Self {
        Self::Prompt(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a stage failure
    pub fn stage(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RolloutError::config("unknown country 'Atlantis'");
        assert_eq!(
            err.to_string(),
            "Configuration error: unknown country 'Atlantis'"
        );

        let err = RolloutError::validation("rollout_date is required");
        assert_eq!(err.to_string(), "Validation error: rollout_date is required");

        let err = RolloutError::stage("2_generate_grids", "exit code 1");
        assert_eq!(err.to_string(), "Stage 2_generate_grids failed: exit code 1");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RolloutError = io_err.into();
        assert!(matches!(err, RolloutError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: RolloutError = json_err.into();
        assert!(matches!(err, RolloutError::Json(_)));
    }
}
