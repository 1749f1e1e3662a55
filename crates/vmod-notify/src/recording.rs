//! In-memory notification sink.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{NotifyError, NotifyResult};
use crate::NotificationSink;

/// A message captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub destination: String,
    pub payload: String,
}

/// Sink that records every message instead of delivering it.
///
/// Clones share the same log. A failing sink rejects every send.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<PublishedMessage>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn log(&self) -> MutexGuard<'_, Vec<PublishedMessage>> {
        self.messages.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.log().clone()
    }

    pub fn count(&self) -> usize {
        self.log().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, destination: &str, payload: &str) -> NotifyResult<()> {
        if self.fail {
            return Err(NotifyError::publish_failed(format!(
                "destination {} unreachable",
                destination
            )));
        }

        self.log().push(PublishedMessage {
            destination: destination.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
