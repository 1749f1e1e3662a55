//! Client for the image moderation classifier service.
//!
//! The classifier looks at one stored image and returns the moderation
//! categories it detects. The pipeline only sees the
//! [`ModerationClassifier`] trait; [`HttpClassifier`] talks to the service.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use client::{ClassifierConfig, HttpClassifier};
pub use error::{ClassifierError, ClassifierResult};
pub use types::{ClassifyRequest, ClassifyResponse, RawLabel};

/// Image moderation classifier.
#[async_trait]
pub trait ModerationClassifier: Send + Sync {
    /// Detect moderation labels on the image at `bucket/key`.
    ///
    /// One attempt per call. Callers own the retry policy.
    async fn detect_labels(
        &self,
        bucket: &str,
        key: &str,
        min_confidence: f64,
    ) -> ClassifierResult<Vec<RawLabel>>;
}
