//! Worker error types.

use thiserror::Error;

use vmod_classifier::ClassifierError;
use vmod_media::MediaError;
use vmod_models::ModelError;
use vmod_notify::NotifyError;
use vmod_storage::StorageError;

use crate::state::PipelineState;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Frame extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Classification failed for {key}: {source}")]
    ClassificationFailed { key: String, source: ClassifierError },

    #[error("Failed to parse moderation record {key}: {message}")]
    ConsolidationParse { key: String, message: String },

    #[error("Report publish failed: {0}")]
    PublishFailed(#[from] NotifyError),

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn extraction_failed(msg: impl Into<String>) -> Self {
        Self::ExtractionFailed(msg.into())
    }

    pub fn classification_failed(key: impl Into<String>, source: ClassifierError) -> Self {
        Self::ClassificationFailed {
            key: key.into(),
            source,
        }
    }

    pub fn consolidation_parse(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsolidationParse {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Check if error is retryable.
    ///
    /// Only transient classifier and storage failures qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::ClassificationFailed { source, .. } => source.is_retryable(),
            WorkerError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// HTTP-style status code for handler responses.
    pub fn status_code(&self) -> u16 {
        match self {
            WorkerError::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Validation(_) => "validation",
            WorkerError::ExtractionFailed(_) => "extraction",
            WorkerError::ClassificationFailed { .. } => "classification",
            WorkerError::ConsolidationParse { .. } => "consolidation_parse",
            WorkerError::PublishFailed(_) => "publish",
            WorkerError::Timeout(_) => "timeout",
            WorkerError::Cancelled => "cancelled",
            WorkerError::InvalidTransition { .. } => "invalid_transition",
            WorkerError::Storage(_) => "storage",
            WorkerError::TaskFailed(_) => "task",
            WorkerError::ConfigError(_) => "config",
            WorkerError::Io(_) => "io",
        }
    }
}

impl From<ModelError> for WorkerError {
    fn from(e: ModelError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<MediaError> for WorkerError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Cancelled => Self::Cancelled,
            MediaError::Timeout(secs) => Self::Timeout(secs),
            MediaError::ExtractionFailed(msg) => Self::ExtractionFailed(msg),
            other => Self::ExtractionFailed(other.to_string()),
        }
    }
}
