//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "vmod_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vmod_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "vmod_job_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "vmod_stage_duration_seconds";

    pub const FRAMES_MODERATED_TOTAL: &str = "vmod_frames_moderated_total";
    pub const FRAMES_FLAGGED_TOTAL: &str = "vmod_frames_flagged_total";
    pub const FRAMES_SKIPPED_TOTAL: &str = "vmod_frames_skipped_total";
    pub const CLASSIFIER_FAILURES_TOTAL: &str = "vmod_classifier_failures_total";

    pub const UNIT_RETRIES_TOTAL: &str = "vmod_unit_retries_total";
    pub const CLEANUP_FAILURES_TOTAL: &str = "vmod_cleanup_failures_total";
}

/// Record a finished run.
pub fn record_job_completed(topology: &str, duration_secs: f64) {
    let labels = [("topology", topology.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a failed run.
pub fn record_job_failed(topology: &str, reason: &str) {
    let labels = [
        ("topology", topology.to_string()),
        ("reason", reason.to_string()),
    ];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record time spent in one pipeline state.
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record one moderated frame.
pub fn record_frame_moderated(flagged: bool) {
    counter!(names::FRAMES_MODERATED_TOTAL).increment(1);
    if flagged {
        counter!(names::FRAMES_FLAGGED_TOTAL).increment(1);
    }
}

pub fn record_frame_skipped() {
    counter!(names::FRAMES_SKIPPED_TOTAL).increment(1);
}

pub fn record_classifier_failure(retryable: bool) {
    let labels = [("retryable", retryable.to_string())];
    counter!(names::CLASSIFIER_FAILURES_TOTAL, &labels).increment(1);
}

pub fn record_unit_retries(retries: u32) {
    if retries > 0 {
        counter!(names::UNIT_RETRIES_TOTAL).increment(retries as u64);
    }
}

pub fn record_cleanup_failure(scope: &str) {
    let labels = [("scope", scope.to_string())];
    counter!(names::CLEANUP_FAILURES_TOTAL, &labels).increment(1);
}
