//! Error types for neural_anp.

use thiserror::Error;

/// Errors that can occur while building, running, or persisting a model.
#[derive(Error, Debug)]
pub enum AnpError {
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Tensor shape mismatch on a named input.
    #[error("tensor shape mismatch for {name}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Name of the offending tensor.
        name: String,
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// A context or target set without any points.
    #[error("point set {name} is empty")]
    EmptyPointSet {
        /// Name of the empty set.
        name: String,
    },

    /// A parameter expected by the model is absent from a mapping.
    #[error("missing parameter: {name}")]
    MissingParameter {
        /// Fully-qualified parameter name.
        name: String,
    },

    /// Training error.
    #[error("training error: {message}")]
    TrainingError {
        /// Description of the error.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or corrupted data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl AnpError {
    /// Shorthand for [`AnpError::InvalidConfig`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type for neural_anp operations.
pub type Result<T> = std::result::Result<T, AnpError>;
