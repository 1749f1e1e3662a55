//! Shared pipeline collaborators.

use std::sync::Arc;

use tokio::sync::watch;

use vmod_classifier::{HttpClassifier, ModerationClassifier};
use vmod_media::{FfmpegDecoder, FrameDecoder, FrameExtractor};
use vmod_notify::{NotificationSink, RedisNotifier, ReportPublisher};
use vmod_storage::{ObjectStore, S3Store};

use crate::aggregator::ResultAggregator;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::moderator::FrameModerator;

/// Everything a pipeline run needs, injected as trait objects.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub store: Arc<dyn ObjectStore>,
    pub extractor: FrameExtractor,
    pub moderator: FrameModerator,
    pub aggregator: ResultAggregator,
    pub publisher: ReportPublisher,
}

impl PipelineContext {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn ObjectStore>,
        decoder: Arc<dyn FrameDecoder>,
        classifier: Arc<dyn ModerationClassifier>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            extractor: FrameExtractor::new(decoder),
            moderator: FrameModerator::new(classifier),
            aggregator: ResultAggregator::new(Arc::clone(&store)),
            publisher: ReportPublisher::new(sink),
            store,
        }
    }

    /// Build production clients from environment variables.
    ///
    /// The decoder is killed when `cancel_rx` flips or the job budget runs out.
    pub async fn from_env(
        config: WorkerConfig,
        cancel_rx: watch::Receiver<bool>,
    ) -> WorkerResult<Self> {
        let store = S3Store::from_env().await?;

        let classifier = HttpClassifier::from_env().map_err(|e| {
            WorkerError::config_error(format!("Failed to create classifier client: {}", e))
        })?;

        let notifier = RedisNotifier::from_env().map_err(|e| {
            WorkerError::config_error(format!("Failed to create notifier: {}", e))
        })?;

        let decoder = FfmpegDecoder::new()
            .with_timeout(config.job_timeout.as_secs().max(1))
            .with_cancel(cancel_rx);

        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(decoder),
            Arc::new(classifier),
            Arc::new(notifier),
        ))
    }
}
