//! Moderation labels, per-frame results and the job report.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Operation tag carried by every report.
pub const API_TAG: &str = "cm_video_moderation_image_sampling";

/// One flagged category for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModerationLabel {
    /// Confidence score (0-100)
    pub confidence: f64,
    /// Category name
    pub name: String,
    /// Parent category name, empty for top-level categories
    #[serde(default)]
    pub parent_name: String,
}

impl ModerationLabel {
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>, confidence: f64) -> Self {
        Self {
            confidence,
            name: name.into(),
            parent_name: parent_name.into(),
        }
    }
}

/// Moderation outcome for a single frame.
///
/// This is also the shape of the per-frame record persisted by fan-out
/// workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameResult {
    /// Offset of the frame into the source video, in milliseconds
    pub timestamp_ms: f64,
    /// Labels at or above the job's confidence threshold
    pub labels: Vec<ModerationLabel>,
}

impl FrameResult {
    pub fn new(timestamp_ms: f64, labels: Vec<ModerationLabel>) -> Self {
        Self {
            timestamp_ms,
            labels,
        }
    }

    /// Result with no flagged labels.
    pub fn empty(timestamp_ms: f64) -> Self {
        Self::new(timestamp_ms, Vec::new())
    }

    /// Whether any label was flagged.
    pub fn is_flagged(&self) -> bool {
        !self.labels.is_empty()
    }
}

/// Location of a video in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRef {
    pub bucket: String,
    pub key: String,
}

impl VideoRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// File name component of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Final, time-ordered moderation report for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub job_id: JobId,
    pub api_tag: String,
    pub video: VideoRef,
    /// Flagged frames, ascending by timestamp
    pub moderation_labels: Vec<FrameResult>,
}

impl Report {
    /// Build a report from already filtered and sorted frame results.
    pub fn new(job_id: JobId, video: VideoRef, moderation_labels: Vec<FrameResult>) -> Self {
        Self {
            job_id,
            api_tag: API_TAG.to_string(),
            video,
            moderation_labels,
        }
    }

    /// Number of flagged frames.
    pub fn flagged_frames(&self) -> usize {
        self.moderation_labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_wire_format() {
        let report = Report::new(
            JobId::from_string("bucket_vid_mp4"),
            VideoRef::new("bucket", "vid.mp4"),
            vec![FrameResult::new(
                1000.0,
                vec![ModerationLabel::new("Violence", "", 80.0)],
            )],
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["job_id"], "bucket_vid_mp4");
        assert_eq!(json["api_tag"], API_TAG);
        assert_eq!(json["video"]["bucket"], "bucket");
        assert_eq!(json["video"]["key"], "vid.mp4");
        assert_eq!(json["moderation_labels"][0]["timestamp_ms"], 1000.0);
        assert_eq!(json["moderation_labels"][0]["labels"][0]["confidence"], 80.0);
        assert_eq!(json["moderation_labels"][0]["labels"][0]["name"], "Violence");
        assert_eq!(json["moderation_labels"][0]["labels"][0]["parent_name"], "");
    }

    #[test]
    fn test_record_without_parent_name() {
        let record: FrameResult = serde_json::from_str(
            r#"{"timestamp_ms": 2000.0, "labels": [{"confidence": 91.5, "name": "Suggestive"}]}"#,
        )
        .unwrap();
        assert!(record.is_flagged());
        assert_eq!(record.labels[0].parent_name, "");
    }

    #[test]
    fn test_video_file_name() {
        assert_eq!(VideoRef::new("b", "a/b/Clip.mp4").file_name(), "Clip.mp4");
        assert_eq!(VideoRef::new("b", "clip.mp4").file_name(), "clip.mp4");
    }
}
