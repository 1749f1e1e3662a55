//! Structured job logging.
//!
//! Every lifecycle line of a moderation run carries the job ID and the
//! stage running it, plus the frame counts known at that point as fields.

use tracing::{error, info, Span};
use vmod_models::{JobId, Report, VideoRef};

use crate::error::WorkerError;

/// Lifecycle logger for one stage of one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    stage: &'static str,
}

impl JobLogger {
    /// `stage` is the topology or distributed stage, e.g. "monolithic" or
    /// "capture_frames".
    pub fn new(job_id: &JobId, stage: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage,
        }
    }

    pub fn log_start(&self, source: &VideoRef, sample_frequency: f64) {
        info!(
            job_id = %self.job_id,
            stage = self.stage,
            source_bucket = %source.bucket,
            source_key = %source.key,
            sample_frequency,
            "Job started"
        );
    }

    pub fn log_extracted(&self, frames: usize) {
        info!(job_id = %self.job_id, stage = self.stage, frames, "Frames extracted");
    }

    pub fn log_uploaded(&self, frames: usize) {
        info!(job_id = %self.job_id, stage = self.stage, frames, "Frames uploaded");
    }

    pub fn log_report(&self, report: &Report) {
        info!(
            job_id = %self.job_id,
            stage = self.stage,
            flagged = report.flagged_frames(),
            "Job completed"
        );
    }

    pub fn log_unpublished(&self) {
        info!(
            job_id = %self.job_id,
            stage = self.stage,
            "No notification topic, report not published"
        );
    }

    pub fn log_failed(&self, error: &WorkerError) {
        error!(
            job_id = %self.job_id,
            stage = self.stage,
            error_kind = error.kind(),
            retryable = error.is_retryable(),
            "Job failed: {}", error
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, stage = self.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::derive_from_source("bucket", "dir/vid.mp4");
        let logger = JobLogger::new(&job_id, "monolithic");

        assert_eq!(logger.job_id(), "bucket_dir_vid_mp4");
        assert_eq!(logger.stage(), "monolithic");
    }

    #[test]
    fn test_lifecycle_lines_carry_counts() {
        let job_id = JobId::from_string("job-123");
        let logger = JobLogger::new(&job_id, "capture_frames");

        let out = capture(|| {
            logger.log_start(&VideoRef::new("bucket", "vid.mp4"), 0.5);
            logger.log_uploaded(7);
        });

        assert!(out.contains("Job started"));
        assert!(out.contains("source_key=vid.mp4"));
        assert!(out.contains("sample_frequency=0.5"));
        assert!(out.contains("frames=7"));
        assert!(out.contains("stage=\"capture_frames\"") || out.contains("stage=capture_frames"));
        assert!(out.contains("job_id=job-123"));
    }

    #[test]
    fn test_failure_line_names_error_kind() {
        let logger = JobLogger::new(&JobId::from_string("job-9"), "consolidate");

        let out = capture(|| logger.log_failed(&WorkerError::Timeout(900)));

        assert!(out.contains("ERROR"));
        assert!(out.contains("error_kind=\"timeout\"") || out.contains("error_kind=timeout"));
        assert!(out.contains("retryable=false"));
    }
}
