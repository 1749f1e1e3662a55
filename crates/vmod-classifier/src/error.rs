//! Classifier client error types.

use thiserror::Error;

pub type ClassifierResult<T> = Result<T, ClassifierError>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Classifier rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClassifierError {
    /// Throttling, server errors and transport failures are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassifierError::ServiceUnavailable(_)
                | ClassifierError::Timeout(_)
                | ClassifierError::Network(_)
        )
    }
}
