//! Long-poll update source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::telegram::TelegramClient;
use crate::updates::Update;

/// Update types the bot subscribes to.
pub const ALLOWED_UPDATES: [&str; 4] = [
    "message",
    "chat_join_request",
    "chat_member",
    "my_chat_member",
];

/// Produces batches of inbound updates.
#[async_trait]
pub trait UpdateSource: Send {
    /// Wait for the next batch. An empty batch means the poll timed out.
    async fn next_batch(&mut self) -> Result<Vec<Update>, GatewayError>;
}

/// `getUpdates` loop that acknowledges each batch by advancing the offset.
pub struct LongPoller {
    client: Arc<TelegramClient>,
    offset: Option<i64>,
    timeout_secs: u64,
}

impl LongPoller {
    pub fn new(client: Arc<TelegramClient>, timeout_secs: u64) -> Self {
        Self {
            client,
            offset: None,
            timeout_secs,
        }
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Back-off to apply after a failed poll. Permanent failures (revoked
    /// token, bad configuration) wait longer than transient ones.
    pub fn backoff_for(error: &GatewayError) -> Duration {
        match error {
            GatewayError::RateLimited { retry_after } => Duration::from_secs(*retry_after),
            e if e.is_transient() => Duration::from_secs(3),
            _ => Duration::from_secs(30),
        }
    }
}

/// Offset acknowledging every update in `batch`.
fn next_offset(current: Option<i64>, batch: &[Update]) -> Option<i64> {
    batch
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .max(current)
}

#[async_trait]
impl UpdateSource for LongPoller {
    async fn next_batch(&mut self) -> Result<Vec<Update>, GatewayError> {
        let batch = self
            .client
            .get_updates(self.offset, self.timeout_secs, &ALLOWED_UPDATES)
            .await?;
        self.offset = next_offset(self.offset, &batch);
        if !batch.is_empty() {
            tracing::debug!(count = batch.len(), offset = ?self.offset, "received updates");
        }
        Ok(batch)
    }
}
