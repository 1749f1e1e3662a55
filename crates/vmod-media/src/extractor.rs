//! Frame extraction.
//!
//! Runs the decoder over a local video and returns the emitted frames in
//! sequence order, each tagged with its offset into the video.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info};
use vmod_models::TimestampPolicy;

use crate::decoder::FrameDecoder;
use crate::error::{MediaError, MediaResult};

/// Output pattern handed to the decoder.
pub const FRAME_FILE_PATTERN: &str = "%06d.png";

/// Width of the zero-padded sequence number in frame file names.
const SEQUENCE_WIDTH: usize = 6;

/// One extracted still image.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFrame {
    /// 1-based sequence number assigned by the decoder
    pub sequence: u64,
    /// Offset into the source video in milliseconds
    pub timestamp_ms: f64,
    /// Local path of the image
    pub path: PathBuf,
}

/// File name the decoder gives frame `sequence`.
pub fn frame_file_name(sequence: u64) -> String {
    format!("{:0width$}.png", sequence, width = SEQUENCE_WIDTH)
}

/// Parse a decoder frame file name (`000042.png`) into its sequence number.
///
/// Anything else in the directory, such as the source video, yields `None`.
pub fn sequence_from_file_name(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(".png")?;
    if stem.len() < SEQUENCE_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Extracts timestamped frames through a [`FrameDecoder`].
#[derive(Clone)]
pub struct FrameExtractor {
    decoder: Arc<dyn FrameDecoder>,
}

impl FrameExtractor {
    pub fn new(decoder: Arc<dyn FrameDecoder>) -> Self {
        Self { decoder }
    }

    /// Sample `video` at `sampling_frequency` fps into `output_dir`.
    ///
    /// An empty result is returned only for videos no longer than one
    /// sampling interval; zero frames from a longer video is an error.
    pub async fn extract(
        &self,
        video: &Path,
        sampling_frequency: f64,
        policy: TimestampPolicy,
        output_dir: &Path,
    ) -> MediaResult<Vec<ExtractedFrame>> {
        vmod_models::timestamp::validate_frequency(sampling_frequency)
            .map_err(|e| MediaError::extraction_failed(e.to_string()))?;

        if !video.exists() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }

        tokio::fs::create_dir_all(output_dir).await?;

        self.decoder
            .decode(video, sampling_frequency, output_dir)
            .await
            .map_err(|e| match e {
                MediaError::Cancelled | MediaError::Timeout(_) => e,
                other => MediaError::extraction_failed(other.to_string()),
            })?;

        let sequences = list_frame_sequences(output_dir).await?;

        if sequences.is_empty() {
            let duration = self.decoder.duration_secs(video).await?;
            let interval = 1.0 / sampling_frequency;
            if duration > interval {
                return Err(MediaError::extraction_failed(format!(
                    "decoder produced no frames for a {:.3}s video at {} fps",
                    duration, sampling_frequency
                )));
            }
            info!(
                "Video shorter than one sampling interval ({:.3}s <= {:.3}s), no frames",
                duration, interval
            );
            return Ok(Vec::new());
        }

        check_contiguous(&sequences)?;

        let frames = sequences
            .into_iter()
            .map(|sequence| {
                let timestamp_ms = policy
                    .timestamp_ms(sequence, sampling_frequency)
                    .map_err(|e| MediaError::InvalidFrame(e.to_string()))?;
                Ok(ExtractedFrame {
                    sequence,
                    timestamp_ms,
                    path: output_dir.join(frame_file_name(sequence)),
                })
            })
            .collect::<MediaResult<Vec<_>>>()?;

        counter!("vmod_frames_extracted_total").increment(frames.len() as u64);
        debug!("Extracted {} frames from {}", frames.len(), video.display());

        Ok(frames)
    }
}

/// Sorted sequence numbers of every frame file in `dir`.
async fn list_frame_sequences(dir: &Path) -> MediaResult<Vec<u64>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut sequences = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if let Some(seq) = entry.file_name().to_str().and_then(sequence_from_file_name) {
            sequences.push(seq);
        }
    }

    sequences.sort_unstable();
    Ok(sequences)
}

/// Numbering must be exactly `1..=n`.
fn check_contiguous(sequences: &[u64]) -> MediaResult<()> {
    for (idx, seq) in sequences.iter().enumerate() {
        let expected = idx as u64 + 1;
        if *seq != expected {
            return Err(MediaError::extraction_failed(format!(
                "frame numbering broken: expected {}, found {}",
                frame_file_name(expected),
                frame_file_name(*seq)
            )));
        }
    }
    Ok(())
}
