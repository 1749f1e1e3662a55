//! Object-store key layout for one job's frames.
//!
//! Every artifact of a run lives under `target_folder/video_name/`:
//! frame images as `<timestamp>.png` and per-frame moderation records as
//! `<timestamp>.json`. The prefix is owned by exactly one job, so deleting
//! everything under it never touches another job's data.

use serde::{Deserialize, Serialize};

use crate::timestamp::format_timestamp;

/// Extension of extracted frame images.
pub const IMAGE_EXTENSION: &str = ".png";

/// Extension of persisted per-frame moderation records.
pub const RECORD_EXTENSION: &str = ".json";

/// Key builder for a job's frame folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    /// Bucket holding the frames
    pub bucket: String,
    /// Folder without trailing slash, e.g. `media/screenshot/vid.mp4`
    pub folder: String,
}

impl FrameLayout {
    /// Build a layout from a target folder and the source video's file name.
    ///
    /// The video name is lower-cased and appended as a sub folder.
    pub fn new(bucket: impl Into<String>, target_folder: &str, video_file_name: &str) -> Self {
        let target_folder = target_folder.trim_end_matches('/');
        let video_name = video_file_name.to_lowercase();
        let folder = if target_folder.is_empty() {
            video_name
        } else {
            format!("{}/{}", target_folder, video_name)
        };

        Self {
            bucket: bucket.into(),
            folder,
        }
    }

    /// Listing prefix, always ending with `/`.
    pub fn prefix(&self) -> String {
        format!("{}/", self.folder)
    }

    /// Key of the frame image at `timestamp_ms`.
    pub fn image_key(&self, timestamp_ms: f64) -> String {
        format!("{}/{}{}", self.folder, format_timestamp(timestamp_ms), IMAGE_EXTENSION)
    }

    /// Key of the moderation record at `timestamp_ms`.
    pub fn record_key(&self, timestamp_ms: f64) -> String {
        format!("{}/{}{}", self.folder, format_timestamp(timestamp_ms), RECORD_EXTENSION)
    }
}

/// Map a frame image key to its record key.
pub fn record_key_for_image(image_key: &str) -> Option<String> {
    image_key
        .strip_suffix(IMAGE_EXTENSION)
        .map(|stem| format!("{}{}", stem, RECORD_EXTENSION))
}

/// Map a record key to its frame image key.
pub fn image_key_for_record(record_key: &str) -> Option<String> {
    record_key
        .strip_suffix(RECORD_EXTENSION)
        .map(|stem| format!("{}{}", stem, IMAGE_EXTENSION))
}
