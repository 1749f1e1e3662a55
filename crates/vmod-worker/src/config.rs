//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;
use vmod_models::{JobDefaults, TimestampPolicy};

use crate::retry::RetryConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent directory of per-job scratch directories
    pub work_dir: PathBuf,
    /// Wall-clock budget for one run
    pub job_timeout: Duration,
    /// Maximum fan-out units in flight
    pub max_fanout: usize,
    /// Sampling frequency when the trigger sets none
    pub sample_frequency: f64,
    /// How frame sequence numbers map to video time
    pub timestamp_policy: TimestampPolicy,
    /// Keep uploaded frame images after a monolithic run
    pub retain_frames: bool,
    /// Retries per fan-out unit (not counting the first attempt)
    pub unit_retries: u32,
    /// Base delay of the unit retry backoff
    pub retry_base_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vmod"),
            job_timeout: Duration::from_secs(900),
            max_fanout: 8,
            sample_frequency: 0.5,
            timestamp_policy: TimestampPolicy::OneBased,
            retain_frames: false,
            unit_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timestamp_policy = match std::env::var("TIMESTAMP_POLICY") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                warn!("{}, falling back to {}", e, defaults.timestamp_policy);
                defaults.timestamp_policy
            }),
            Err(_) => defaults.timestamp_policy,
        };

        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            job_timeout: Duration::from_secs(
                std::env::var("WORKER_JOB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|n: &u64| *n > 0)
                    .unwrap_or(900),
            ),
            max_fanout: std::env::var("WORKER_MAX_FANOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_fanout),
            sample_frequency: std::env::var("SAMPLE_FREQUENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|f: &f64| f.is_finite() && *f > 0.0)
                .unwrap_or(defaults.sample_frequency),
            timestamp_policy,
            retain_frames: std::env::var("PIPELINE_RETAIN_FRAMES")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            unit_retries: std::env::var("WORKER_UNIT_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.unit_retries),
            retry_base_delay: Duration::from_millis(
                std::env::var("WORKER_RETRY_BASE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
        }
    }

    /// Defaults applied while resolving triggers.
    pub fn job_defaults(&self) -> JobDefaults {
        JobDefaults {
            sample_frequency: self.sample_frequency,
            timestamp_policy: self.timestamp_policy,
        }
    }

    /// Retry policy of one fan-out unit.
    pub fn unit_retry(&self) -> RetryConfig {
        RetryConfig::new("moderate_frame")
            .with_max_retries(self.unit_retries)
            .with_base_delay(self.retry_base_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.job_timeout, Duration::from_secs(900));
        assert_eq!(config.max_fanout, 8);
        assert_eq!(config.sample_frequency, 0.5);
        assert_eq!(config.timestamp_policy, TimestampPolicy::OneBased);
        assert!(!config.retain_frames);

        let defaults = config.job_defaults();
        assert_eq!(defaults.sample_frequency, 0.5);
    }

    #[test]
    fn test_unit_retry_policy() {
        let config = WorkerConfig {
            unit_retries: 5,
            retry_base_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let retry = config.unit_retry();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_zero_limits_fall_back_to_defaults() {
        std::env::set_var("WORKER_JOB_TIMEOUT", "0");
        std::env::set_var("WORKER_MAX_FANOUT", "0");
        let config = WorkerConfig::from_env();
        assert_eq!(config.job_timeout, Duration::from_secs(900));
        assert_eq!(config.max_fanout, 8);

        std::env::set_var("WORKER_JOB_TIMEOUT", "30");
        assert_eq!(WorkerConfig::from_env().job_timeout, Duration::from_secs(30));

        std::env::remove_var("WORKER_JOB_TIMEOUT");
        std::env::remove_var("WORKER_MAX_FANOUT");
    }
}
