//! Helpers shared by both pipeline topologies.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, warn};

use vmod_media::ExtractedFrame;
use vmod_models::{FrameLayout, JobSpec};
use vmod_storage::ObjectStore;

use crate::context::PipelineContext;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::scratch::ScratchDir;

/// A receiver whose sender is gone: never cancelled.
pub(crate) fn never_cancelled() -> watch::Receiver<bool> {
    watch::channel(false).1
}

pub(crate) fn check_cancelled(cancel_rx: &watch::Receiver<bool>) -> WorkerResult<()> {
    if *cancel_rx.borrow() {
        Err(WorkerError::Cancelled)
    } else {
        Ok(())
    }
}

/// Run `fut` within `budget`, mapping expiry to [`WorkerError::Timeout`].
pub(crate) async fn with_budget<T>(
    budget: Duration,
    fut: impl Future<Output = WorkerResult<T>>,
) -> WorkerResult<T> {
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(WorkerError::Timeout(budget.as_secs())),
    }
}

/// Best-effort removal of every remote artifact of a failed run.
pub(crate) async fn purge_frames(store: &dyn ObjectStore, layout: &FrameLayout) {
    match store.delete_prefix(&layout.bucket, &layout.prefix()).await {
        Ok(n) => debug!("Purged {} objects under {}", n, layout.prefix()),
        Err(e) => {
            warn!("Failed to purge {}: {}", layout.prefix(), e);
            metrics::record_cleanup_failure("remote");
        }
    }
}

/// Download the source video and extract its frames into `scratch`.
pub(crate) async fn download_and_extract(
    ctx: &PipelineContext,
    spec: &JobSpec,
    scratch: &ScratchDir,
    cancel_rx: &watch::Receiver<bool>,
) -> WorkerResult<Vec<ExtractedFrame>> {
    let video_path: PathBuf = scratch.source_path(spec.video_file_name());

    let started = Instant::now();
    ctx.store
        .download_file(&spec.source.bucket, &spec.source.key, &video_path)
        .await?;
    check_cancelled(cancel_rx)?;

    let frames = ctx
        .extractor
        .extract(
            &video_path,
            spec.sample_frequency,
            spec.timestamp_policy,
            &scratch.frames_dir(),
        )
        .await?;

    metrics::record_stage_duration("extracting", started.elapsed().as_secs_f64());
    Ok(frames)
}

/// Upload one extracted frame to its timestamp key.
pub(crate) async fn upload_frame(
    store: &dyn ObjectStore,
    layout: &FrameLayout,
    frame: &ExtractedFrame,
) -> WorkerResult<String> {
    let key = layout.image_key(frame.timestamp_ms);
    store
        .upload_file(&layout.bucket, &key, &frame.path, "image/png")
        .await?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_budget_expiry_is_timeout() {
        let err = with_budget(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, WorkerError::Timeout(_)));
    }

    #[test]
    fn test_cancel_check() {
        assert!(check_cancelled(&never_cancelled()).is_ok());

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert!(matches!(check_cancelled(&rx), Err(WorkerError::Cancelled)));
    }
}
