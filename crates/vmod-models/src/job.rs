//! Job trigger and resolved job specification.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::layout::FrameLayout;
use crate::moderation::VideoRef;
use crate::timestamp::{validate_frequency, TimestampPolicy};

/// Confidence threshold used when the trigger does not set one.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 50.0;

/// Sub folder used for frames when the trigger names no target folder.
pub const DEFAULT_OUTPUT_FOLDER: &str = "screenshot";

/// Identifier of one moderation run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive a stable ID from the source location.
    ///
    /// `bucket/dir/vid.mp4` becomes `bucket_dir_vid_mp4`.
    pub fn derive_from_source(bucket: &str, key: &str) -> Self {
        Self(format!("{}_{}", bucket, key).replace(|c: char| c == '/' || c == '.', "_"))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw pipeline trigger as received from the caller.
///
/// Field aliases accept the legacy `s3_*` and `sns_topic_arn` event names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ModerationTrigger {
    #[serde(alias = "s3_source_bucket")]
    pub source_bucket: Option<String>,

    #[serde(alias = "s3_source_key")]
    pub source_key: Option<String>,

    #[serde(alias = "s3_target_bucket", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub target_bucket: Option<String>,

    #[serde(alias = "s3_target_folder", skip_serializing_if = "Option::is_none")]
    pub target_folder: Option<String>,

    /// Frames per second to extract
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(exclusive_min = 0.0))]
    pub sample_frequency: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub min_confidence: Option<f64>,

    #[serde(alias = "sns_topic_arn", skip_serializing_if = "Option::is_none")]
    pub notification_topic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl ModerationTrigger {
    /// Create a trigger for a source video.
    pub fn new(source_bucket: impl Into<String>, source_key: impl Into<String>) -> Self {
        Self {
            source_bucket: Some(source_bucket.into()),
            source_key: Some(source_key.into()),
            ..Default::default()
        }
    }

    /// Parse a trigger from JSON, rejecting unknown shapes.
    pub fn from_json(input: &str) -> ModelResult<Self> {
        let value: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| ModelError::validation(format!("Malformed trigger: {}", e)))?;

        if value.is_null() {
            return Err(missing_source());
        }

        serde_json::from_value(value)
            .map_err(|e| ModelError::validation(format!("Malformed trigger: {}", e)))
    }

    pub fn with_sample_frequency(mut self, frequency: f64) -> Self {
        self.sample_frequency = Some(frequency);
        self
    }

    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    pub fn with_target(mut self, bucket: impl Into<String>, folder: impl Into<String>) -> Self {
        self.target_bucket = Some(bucket.into());
        self.target_folder = Some(folder.into());
        self
    }

    pub fn with_notification_topic(mut self, topic: impl Into<String>) -> Self {
        self.notification_topic = Some(topic.into());
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

fn missing_source() -> ModelError {
    ModelError::validation("Require parameters: source_bucket and source_key.")
}

/// Deployment-level defaults applied while resolving a trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobDefaults {
    pub sample_frequency: f64,
    pub timestamp_policy: TimestampPolicy,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            sample_frequency: 0.5, // 1 frame every 2 seconds
            timestamp_policy: TimestampPolicy::OneBased,
        }
    }
}

/// Validated, immutable description of one moderation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: JobId,
    pub source: VideoRef,
    pub target_bucket: String,
    /// Target folder without trailing slash
    pub target_folder: String,
    pub sample_frequency: f64,
    pub min_confidence: f64,
    pub notification_topic: Option<String>,
    pub timestamp_policy: TimestampPolicy,
}

impl JobSpec {
    /// Validate a trigger and fill in defaults.
    ///
    /// Performs no I/O, so a rejected trigger has no side effects.
    pub fn resolve(trigger: &ModerationTrigger, defaults: &JobDefaults) -> ModelResult<Self> {
        let source_bucket = non_empty(&trigger.source_bucket).ok_or_else(missing_source)?;
        let source_key = non_empty(&trigger.source_key).ok_or_else(missing_source)?;

        trigger
            .validate()
            .map_err(|e| ModelError::validation(format!("Invalid trigger: {}", e)))?;

        let source = VideoRef::new(source_bucket, source_key);
        if source.file_name().is_empty() {
            return Err(ModelError::validation(format!(
                "source_key does not name a file: {}",
                source.key
            )));
        }

        let sample_frequency = trigger.sample_frequency.unwrap_or(defaults.sample_frequency);
        validate_frequency(sample_frequency)
            .map_err(|e| ModelError::validation(e.to_string()))?;

        let min_confidence = trigger.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE);
        if !(0.0..=100.0).contains(&min_confidence) {
            return Err(ModelError::validation(format!(
                "min_confidence must be within 0-100, got {}",
                min_confidence
            )));
        }

        let target_bucket = non_empty(&trigger.target_bucket)
            .unwrap_or(source_bucket)
            .to_string();

        let target_folder = match &trigger.target_folder {
            Some(folder) => folder.trim_end_matches('/').to_string(),
            None => default_target_folder(&source),
        };

        let job_id = match non_empty(&trigger.job_id) {
            Some(id) => JobId::from_string(id),
            None => JobId::derive_from_source(&source.bucket, &source.key),
        };

        Ok(Self {
            job_id,
            source,
            target_bucket,
            target_folder,
            sample_frequency,
            min_confidence,
            notification_topic: non_empty(&trigger.notification_topic).map(str::to_string),
            timestamp_policy: defaults.timestamp_policy,
        })
    }

    /// Key layout of this job's frames and records.
    pub fn layout(&self) -> FrameLayout {
        FrameLayout::new(
            self.target_bucket.clone(),
            &self.target_folder,
            self.source.file_name(),
        )
    }

    /// File name of the source video.
    pub fn video_file_name(&self) -> &str {
        self.source.file_name()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `dir/vid.mp4` resolves to `dir/screenshot`; a bare `vid.mp4` to `screenshot`.
fn default_target_folder(source: &VideoRef) -> String {
    let dir = source
        .key
        .rsplit_once('/')
        .map(|(dir, _)| dir.trim_end_matches('/'))
        .unwrap_or("");

    if dir.is_empty() {
        DEFAULT_OUTPUT_FOLDER.to_string()
    } else {
        format!("{}/{}", dir, DEFAULT_OUTPUT_FOLDER)
    }
}
