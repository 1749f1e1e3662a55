//! FFmpeg CLI wrapper for frame sampling.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Cancellation and timeout support via tokio
//! - FFprobe duration lookup
//! - The [`FrameDecoder`] seam and its FFmpeg implementation
//! - [`FrameExtractor`], which turns a video into ordered, timestamped frames

pub mod command;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use decoder::{FfmpegDecoder, FrameDecoder};
pub use error::{MediaError, MediaResult};
pub use extractor::{frame_file_name, sequence_from_file_name, ExtractedFrame, FrameExtractor};
pub use probe::probe_duration;
