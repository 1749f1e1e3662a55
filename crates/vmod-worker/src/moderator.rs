//! Per-frame moderation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vmod_classifier::{ModerationClassifier, RawLabel};
use vmod_models::{parse_frame_timestamp, FrameResult, ModerationLabel, IMAGE_EXTENSION};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Result of moderating one stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum ModerationOutcome {
    /// The object was a frame and was classified; labels may be empty
    Moderated(FrameResult),
    /// The object is not a frame image
    Skipped,
}

/// Classifies one stored frame and keeps labels at or above a threshold.
#[derive(Clone)]
pub struct FrameModerator {
    classifier: Arc<dyn ModerationClassifier>,
}

impl FrameModerator {
    pub fn new(classifier: Arc<dyn ModerationClassifier>) -> Self {
        Self { classifier }
    }

    /// Moderate the frame stored at `bucket/key`.
    ///
    /// Calls the classifier exactly once. The timestamp comes from the key's
    /// file name, so only `<timestamp>.png` keys are moderated.
    pub async fn moderate(
        &self,
        bucket: &str,
        key: &str,
        min_confidence: f64,
    ) -> WorkerResult<ModerationOutcome> {
        if !key.ends_with(IMAGE_EXTENSION) {
            debug!("Skipping non-frame object {}", key);
            metrics::record_frame_skipped();
            return Ok(ModerationOutcome::Skipped);
        }

        let timestamp_ms = match parse_frame_timestamp(key) {
            Ok(ts) => ts,
            Err(e) => {
                warn!("Skipping {}: {}", key, e);
                metrics::record_frame_skipped();
                return Ok(ModerationOutcome::Skipped);
            }
        };

        let raw = self
            .classifier
            .detect_labels(bucket, key, min_confidence)
            .await
            .map_err(|e| {
                metrics::record_classifier_failure(e.is_retryable());
                WorkerError::classification_failed(key, e)
            })?;

        let result = FrameResult::new(timestamp_ms, filter_labels(raw, min_confidence));
        metrics::record_frame_moderated(result.is_flagged());
        debug!(
            "Moderated {} at {}ms: {} labels",
            key,
            timestamp_ms,
            result.labels.len()
        );

        Ok(ModerationOutcome::Moderated(result))
    }
}

/// Keep labels with `confidence >= min_confidence`, in classifier order.
fn filter_labels(raw: Vec<RawLabel>, min_confidence: f64) -> Vec<ModerationLabel> {
    raw.into_iter()
        .filter(|label| label.confidence >= min_confidence)
        .map(|label| ModerationLabel {
            confidence: label.confidence,
            name: label.name,
            parent_name: label.parent_name.unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use vmod_classifier::{ClassifierError, ClassifierResult};

    mockall::mock! {
        Classifier {}

        #[async_trait]
        impl ModerationClassifier for Classifier {
            async fn detect_labels(
                &self,
                bucket: &str,
                key: &str,
                min_confidence: f64,
            ) -> ClassifierResult<Vec<RawLabel>>;
        }
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let mut classifier = MockClassifier::new();
        classifier
            .expect_detect_labels()
            .with(eq("b"), eq("f/v.mp4/1000.png"), eq(50.0))
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    RawLabel::new("Violence", None, 80.0),
                    RawLabel::new("Weapons", Some("Violence"), 50.0),
                    RawLabel::new("Gore", Some("Violence"), 49.9),
                ])
            });

        let moderator = FrameModerator::new(Arc::new(classifier));
        let outcome = moderator.moderate("b", "f/v.mp4/1000.png", 50.0).await.unwrap();

        let ModerationOutcome::Moderated(result) = outcome else {
            panic!("expected a moderated frame");
        };
        assert_eq!(result.timestamp_ms, 1000.0);
        assert_eq!(
            result.labels,
            vec![
                ModerationLabel::new("Violence", "", 80.0),
                ModerationLabel::new("Weapons", "Violence", 50.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_qualifying_labels_still_yields_result() {
        let mut classifier = MockClassifier::new();
        classifier
            .expect_detect_labels()
            .times(1)
            .returning(|_, _, _| Ok(vec![RawLabel::new("Suggestive", None, 20.0)]));

        let moderator = FrameModerator::new(Arc::new(classifier));
        let outcome = moderator.moderate("b", "f/v.mp4/0.png", 50.0).await.unwrap();

        assert_eq!(outcome, ModerationOutcome::Moderated(FrameResult::empty(0.0)));
    }

    #[tokio::test]
    async fn test_non_frame_keys_are_skipped() {
        let mut classifier = MockClassifier::new();
        classifier.expect_detect_labels().never();

        let moderator = FrameModerator::new(Arc::new(classifier));
        for key in ["f/v.mp4/1000.json", "f/vid.mp4", "f/v.mp4/cover.png"] {
            assert_eq!(
                moderator.moderate("b", key, 50.0).await.unwrap(),
                ModerationOutcome::Skipped
            );
        }
    }

    #[tokio::test]
    async fn test_single_attempt_on_failure() {
        let mut classifier = MockClassifier::new();
        classifier
            .expect_detect_labels()
            .times(1)
            .returning(|_, _, _| Err(ClassifierError::ServiceUnavailable("503".into())));

        let moderator = FrameModerator::new(Arc::new(classifier));
        let err = moderator.moderate("b", "f/v.mp4/0.png", 50.0).await.unwrap_err();

        assert!(matches!(err, WorkerError::ClassificationFailed { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_outcome_wire_format() {
        let json = serde_json::to_value(ModerationOutcome::Skipped).unwrap();
        assert_eq!(json["status"], "skipped");

        let json =
            serde_json::to_value(ModerationOutcome::Moderated(FrameResult::empty(500.0))).unwrap();
        assert_eq!(json["status"], "moderated");
        assert_eq!(json["result"]["timestamp_ms"], 500.0);
    }
}
