//! Payloads exchanged between distributed pipeline stages.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::job::{JobId, JobSpec, DEFAULT_MIN_CONFIDENCE};
use crate::layout::FrameLayout;
use crate::moderation::VideoRef;
use crate::timestamp::TimestampPolicy;

/// Output of the capture stage, input of fan-out and consolidation.
///
/// Echoes every trigger field with defaults resolved so downstream stages
/// never re-derive them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageHandoff {
    pub job_id: String,
    pub source_bucket: String,
    pub source_key: String,
    pub target_bucket: String,
    pub target_folder: String,
    /// Folder that holds this job's frames and records
    pub temp_folder: String,
    pub sample_frequency: f64,
    pub min_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_topic: Option<String>,
    pub timestamp_policy: TimestampPolicy,
    /// Uploaded frame image keys, in sequence order
    #[serde(default)]
    pub frame_keys: Vec<String>,
}

impl StageHandoff {
    pub fn new(spec: &JobSpec, frame_keys: Vec<String>) -> Self {
        Self {
            job_id: spec.job_id.to_string(),
            source_bucket: spec.source.bucket.clone(),
            source_key: spec.source.key.clone(),
            target_bucket: spec.target_bucket.clone(),
            target_folder: spec.target_folder.clone(),
            temp_folder: spec.layout().folder,
            sample_frequency: spec.sample_frequency,
            min_confidence: spec.min_confidence,
            notification_topic: spec.notification_topic.clone(),
            timestamp_policy: spec.timestamp_policy,
            frame_keys,
        }
    }

    /// Rebuild the job specification carried by this hand-off.
    pub fn job_spec(&self) -> ModelResult<JobSpec> {
        if self.source_bucket.is_empty() || self.source_key.is_empty() {
            return Err(ModelError::validation(
                "Hand-off is missing source_bucket or source_key",
            ));
        }

        Ok(JobSpec {
            job_id: JobId::from_string(self.job_id.clone()),
            source: VideoRef::new(self.source_bucket.clone(), self.source_key.clone()),
            target_bucket: self.target_bucket.clone(),
            target_folder: self.target_folder.clone(),
            sample_frequency: self.sample_frequency,
            min_confidence: self.min_confidence,
            notification_topic: self.notification_topic.clone(),
            timestamp_policy: self.timestamp_policy,
        })
    }

    /// The job's own frame folder.
    ///
    /// `temp_folder` must be the folder derived from the source video, so a
    /// hand-off can never reach into another job's frames.
    pub fn layout(&self) -> ModelResult<FrameLayout> {
        let layout = self.job_spec()?.layout();
        if self.temp_folder.trim_end_matches('/') != layout.folder {
            return Err(ModelError::validation(format!(
                "temp_folder {} is not the job's frame folder {}",
                self.temp_folder, layout.folder
            )));
        }
        Ok(layout)
    }

    /// One fan-out task per uploaded frame.
    pub fn moderation_tasks(&self) -> Vec<ModerateFrameTask> {
        self.frame_keys
            .iter()
            .map(|key| ModerateFrameTask {
                bucket: self.target_bucket.clone(),
                key: key.clone(),
                min_confidence: Some(self.min_confidence),
            })
            .collect()
    }
}

/// Input of one fan-out moderation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ModerateFrameTask {
    #[serde(alias = "s3_bucket")]
    #[validate(length(min = 1))]
    pub bucket: String,
    #[serde(alias = "s3_key")]
    #[validate(length(min = 1))]
    pub key: String,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub min_confidence: Option<f64>,
}

impl ModerateFrameTask {
    /// Check the task and return the confidence threshold to apply.
    pub fn threshold(&self) -> ModelResult<f64> {
        self.validate()
            .map_err(|e| ModelError::validation(format!("Invalid frame task: {}", e)))?;
        Ok(self.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE))
    }
}
