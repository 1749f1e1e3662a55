//! Classifier HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{ClassifierError, ClassifierResult};
use crate::types::{ClassifyRequest, ClassifyResponse, RawLabel};
use crate::ModerationClassifier;

/// Configuration for the classifier client.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Base URL of the classifier service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClassifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("CLASSIFIER_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            timeout: Duration::from_secs(
                std::env::var("CLASSIFIER_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// [`ModerationClassifier`] backed by the classifier HTTP service.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    http: Client,
    config: ClassifierConfig,
}

impl HttpClassifier {
    pub fn new(config: ClassifierConfig) -> ClassifierResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClassifierError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClassifierResult<Self> {
        Self::new(ClassifierConfig::from_env())
    }

    fn endpoint(&self) -> String {
        format!("{}/moderate", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModerationClassifier for HttpClassifier {
    async fn detect_labels(
        &self,
        bucket: &str,
        key: &str,
        min_confidence: f64,
    ) -> ClassifierResult<Vec<RawLabel>> {
        let request = ClassifyRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            min_confidence,
        };

        debug!("Classifying {}/{}", bucket, key);

        let response = self
            .http
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(self.config.timeout.as_secs())
                } else {
                    ClassifierError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Classifier returned {} for {}/{}", status, bucket, key);

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(ClassifierError::ServiceUnavailable(format!(
                    "{}: {}",
                    status, body
                )));
            }
            return Err(ClassifierError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let parsed: ClassifyResponse = serde_json::from_slice(&body)
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        Ok(parsed.moderation_labels)
    }
}
