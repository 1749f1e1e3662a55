//! Frame timestamp mapping.
//!
//! The decoder names every extracted frame by a sequence number. This module
//! turns that number back into a millisecond offset into the source video,
//! and parses the offset back out of a stored frame key.
//!
//! Two anchoring policies exist. ffmpeg's `%06d` pattern starts numbering at
//! 1, so [`TimestampPolicy::OneBased`] is the default: frame 1 is time 0.
//! [`TimestampPolicy::ZeroBased`] treats frame `n` as occurring at `n / f`
//! seconds. A run must use one policy for every stage.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::layout::IMAGE_EXTENSION;

/// How sequence numbers are anchored to video time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// `ms = (1/f) * n * 1000`
    ZeroBased,
    /// `ms = (1/f) * (n - 1) * 1000`
    #[default]
    OneBased,
}

impl TimestampPolicy {
    /// Sequence number that maps to time zero.
    pub fn anchor(&self) -> u64 {
        match self {
            TimestampPolicy::ZeroBased => 0,
            TimestampPolicy::OneBased => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampPolicy::ZeroBased => "zero_based",
            TimestampPolicy::OneBased => "one_based",
        }
    }

    /// Millisecond offset of `sequence_number` at `sampling_frequency` fps.
    pub fn timestamp_ms(&self, sequence_number: u64, sampling_frequency: f64) -> ModelResult<f64> {
        timestamp_ms(sequence_number, sampling_frequency, *self)
    }
}

impl fmt::Display for TimestampPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimestampPolicy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "zero_based" | "zero" => Ok(TimestampPolicy::ZeroBased),
            "one_based" | "one" => Ok(TimestampPolicy::OneBased),
            other => Err(ModelError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Convert a frame sequence number to a millisecond offset.
///
/// No rounding is applied.
///
/// # Examples
/// ```
/// use vmod_models::timestamp::{timestamp_ms, TimestampPolicy};
/// assert_eq!(timestamp_ms(3, 1.0, TimestampPolicy::OneBased).unwrap(), 2000.0);
/// assert_eq!(timestamp_ms(3, 0.5, TimestampPolicy::ZeroBased).unwrap(), 6000.0);
/// ```
pub fn timestamp_ms(
    sequence_number: u64,
    sampling_frequency: f64,
    policy: TimestampPolicy,
) -> ModelResult<f64> {
    validate_frequency(sampling_frequency)?;

    let anchor = policy.anchor();
    if sequence_number < anchor {
        return Err(ModelError::SequenceBeforeAnchor {
            sequence: sequence_number,
            anchor,
        });
    }

    Ok((1.0 / sampling_frequency) * (sequence_number - anchor) as f64 * 1000.0)
}

/// Check that a sampling frequency is usable.
pub fn validate_frequency(sampling_frequency: f64) -> ModelResult<()> {
    if sampling_frequency.is_finite() && sampling_frequency > 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidFrequency(sampling_frequency))
    }
}

/// Format a millisecond offset the way it appears in object keys.
///
/// Uses the shortest representation that parses back to the same value.
pub fn format_timestamp(ms: f64) -> String {
    format!("{}", ms)
}

/// Parse the timestamp out of a stored frame key such as
/// `folder/video.mp4/1000.png`.
pub fn parse_frame_timestamp(key: &str) -> ModelResult<f64> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let stem = file_name
        .strip_suffix(IMAGE_EXTENSION)
        .ok_or_else(|| ModelError::invalid_frame_key(key))?;

    let ms: f64 = stem
        .parse()
        .map_err(|_| ModelError::invalid_frame_key(key))?;

    if !ms.is_finite() || ms < 0.0 {
        return Err(ModelError::invalid_frame_key(key));
    }

    Ok(ms)
}
