//! Frame decoder seam.
//!
//! The pipeline never shells out directly; it talks to a [`FrameDecoder`].
//! [`FfmpegDecoder`] is the production implementation.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::extractor::FRAME_FILE_PATTERN;
use crate::probe::probe_duration;

/// External process that samples still images out of a video.
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    /// Write frames into `output_dir` as `000001.png`, `000002.png`, ...
    /// at `sampling_frequency` frames per second.
    async fn decode(
        &self,
        video: &Path,
        sampling_frequency: f64,
        output_dir: &Path,
    ) -> MediaResult<()>;

    /// Duration of the video in seconds.
    async fn duration_secs(&self, video: &Path) -> MediaResult<f64>;
}

/// FFmpeg-backed decoder.
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder {
    runner: FfmpegRunner,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the decoder once `timeout_secs` elapse.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.runner = self.runner.with_timeout(timeout_secs);
        self
    }

    /// Kill the decoder when the cancellation signal flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_cancel(cancel_rx);
        self
    }
}

#[async_trait]
impl FrameDecoder for FfmpegDecoder {
    async fn decode(
        &self,
        video: &Path,
        sampling_frequency: f64,
        output_dir: &Path,
    ) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(video, output_dir.join(FRAME_FILE_PATTERN))
            .frame_rate(sampling_frequency)
            .log_level("error");

        self.runner.run(&cmd).await
    }

    async fn duration_secs(&self, video: &Path) -> MediaResult<f64> {
        probe_duration(video).await
    }
}
