//! Shared data models for the video moderation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job triggers and the resolved, immutable job specification
//! - Moderation labels, per-frame results and the final report
//! - Frame timestamp mapping
//! - Object-store key layout for frames and per-frame records
//! - Hand-off payloads between distributed pipeline stages

pub mod error;
pub mod handoff;
pub mod job;
pub mod layout;
pub mod moderation;
pub mod timestamp;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use handoff::{ModerateFrameTask, StageHandoff};
pub use job::{JobDefaults, JobId, JobSpec, ModerationTrigger, DEFAULT_MIN_CONFIDENCE};
pub use layout::{FrameLayout, IMAGE_EXTENSION, RECORD_EXTENSION};
pub use moderation::{FrameResult, ModerationLabel, Report, VideoRef, API_TAG};
pub use timestamp::{parse_frame_timestamp, timestamp_ms, TimestampPolicy};
