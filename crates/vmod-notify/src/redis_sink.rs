//! Redis Pub/Sub notification sink.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::NotifyResult;
use crate::NotificationSink;

/// Publishes each message on the channel named by its destination.
#[derive(Debug, Clone)]
pub struct RedisNotifier {
    client: redis::Client,
}

impl RedisNotifier {
    pub fn new(redis_url: &str) -> NotifyResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Create from `REDIS_URL`.
    pub fn from_env() -> NotifyResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        Self::new(&url)
    }
}

#[async_trait]
impl NotificationSink for RedisNotifier {
    async fn send(&self, destination: &str, payload: &str) -> NotifyResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        debug!("Publishing {} bytes to {}", payload.len(), destination);
        let receivers: i64 = conn.publish(destination, payload).await?;
        debug!("Delivered to {} subscribers", receivers);

        Ok(())
    }
}
