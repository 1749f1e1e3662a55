//! Report publishing.
//!
//! This crate provides:
//! - The [`NotificationSink`] seam
//! - [`RedisNotifier`], which publishes on a Redis Pub/Sub channel
//! - [`RecordingSink`], which keeps published messages in memory
//! - [`ReportPublisher`], which serializes a report and sends it once

pub mod error;
pub mod publisher;
pub mod recording;
pub mod redis_sink;

use async_trait::async_trait;

pub use error::{NotifyError, NotifyResult};
pub use publisher::ReportPublisher;
pub use recording::{PublishedMessage, RecordingSink};
pub use redis_sink::RedisNotifier;

/// Destination-addressed message delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `payload` to `destination` once.
    async fn send(&self, destination: &str, payload: &str) -> NotifyResult<()>;
}
