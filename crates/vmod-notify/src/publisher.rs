//! Report publisher.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};
use vmod_models::Report;

use crate::error::NotifyResult;
use crate::NotificationSink;

/// Serializes a [`Report`] and submits it once to a destination.
#[derive(Clone)]
pub struct ReportPublisher {
    sink: Arc<dyn NotificationSink>,
}

impl ReportPublisher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Publish `report` to `destination`.
    ///
    /// Returns `false` without sending when no destination is configured.
    /// There is no retry: a failed send is returned to the caller.
    pub async fn publish(&self, report: &Report, destination: Option<&str>) -> NotifyResult<bool> {
        let Some(destination) = destination.filter(|d| !d.is_empty()) else {
            info!(job_id = %report.job_id, "No notification destination, skipping publish");
            return Ok(false);
        };

        let payload = serde_json::to_string(report)?;

        if let Err(e) = self.sink.send(destination, &payload).await {
            warn!(job_id = %report.job_id, destination, "Report publish failed: {}", e);
            counter!("vmod_reports_publish_failed_total").increment(1);
            return Err(e);
        }

        counter!("vmod_reports_published_total").increment(1);
        info!(
            job_id = %report.job_id,
            destination,
            entries = report.moderation_labels.len(),
            "Published report"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::recording::RecordingSink;
    use vmod_models::{FrameResult, JobId, ModerationLabel, VideoRef};

    fn report() -> Report {
        Report::new(
            JobId::from_string("job-1"),
            VideoRef::new("bucket", "vid.mp4"),
            vec![FrameResult::new(
                1000.0,
                vec![ModerationLabel::new("Violence", "", 80.0)],
            )],
        )
    }

    #[tokio::test]
    async fn test_publishes_once() {
        let sink = RecordingSink::new();
        let publisher = ReportPublisher::new(Arc::new(sink.clone()));

        assert!(publisher.publish(&report(), Some("reports")).await.unwrap());

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].destination, "reports");

        let sent: Report = serde_json::from_str(&messages[0].payload).unwrap();
        assert_eq!(sent, report());
    }

    #[tokio::test]
    async fn test_no_destination_is_noop() {
        let sink = RecordingSink::new();
        let publisher = ReportPublisher::new(Arc::new(sink.clone()));

        assert!(!publisher.publish(&report(), None).await.unwrap());
        assert!(!publisher.publish(&report(), Some("")).await.unwrap());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_failure_surfaces() {
        let publisher = ReportPublisher::new(Arc::new(RecordingSink::failing()));
        let err = publisher.publish(&report(), Some("reports")).await.unwrap_err();
        assert!(matches!(err, NotifyError::PublishFailed(_)));
    }
}
