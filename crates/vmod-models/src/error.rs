//! Model error types.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or interpreting model values.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0}")]
    Validation(String),

    #[error("Sequence number {sequence} is before the anchor frame {anchor}")]
    SequenceBeforeAnchor { sequence: u64, anchor: u64 },

    #[error("Sampling frequency must be a positive finite number, got {0}")]
    InvalidFrequency(f64),

    #[error("Invalid frame key: {0}")]
    InvalidFrameKey(String),

    #[error("Unknown timestamp policy: {0}")]
    UnknownPolicy(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_frame_key(key: impl Into<String>) -> Self {
        Self::InvalidFrameKey(key.into())
    }
}
