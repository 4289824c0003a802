//! Nullable update source: replays a fixed script of batches.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use gatekeeper_gateway::{GatewayError, Update, UpdateSource};

/// Yields the scripted batches in order, then empty batches forever.
pub struct ScriptedUpdates {
    script: VecDeque<Result<Vec<Update>, GatewayError>>,
    idle: Duration,
    polls: usize,
}

impl ScriptedUpdates {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            idle: Duration::from_millis(5),
            polls: 0,
        }
    }

    pub fn push_batch(mut self, batch: Vec<Update>) -> Self {
        self.script.push_back(Ok(batch));
        self
    }

    pub fn push_error(mut self, error: GatewayError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    /// Number of `next_batch` calls served so far.
    pub fn polls(&self) -> usize {
        self.polls
    }

    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }
}

impl Default for ScriptedUpdates {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpdateSource for ScriptedUpdates {
    async fn next_batch(&mut self) -> Result<Vec<Update>, GatewayError> {
        self.polls += 1;
        match self.script.pop_front() {
            Some(next) => next,
            None => {
                tokio::time::sleep(self.idle).await;
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: i64) -> Update {
        serde_json::from_value(serde_json::json!({ "update_id": id })).unwrap()
    }

    #[tokio::test]
    async fn replays_script_then_idles() {
        let mut source = ScriptedUpdates::new()
            .push_batch(vec![update(1), update(2)])
            .push_error(GatewayError::Unreachable("down".into()));

        assert_eq!(source.next_batch().await.unwrap().len(), 2);
        assert!(source.next_batch().await.is_err());
        assert!(source.is_exhausted());
        assert!(source.next_batch().await.unwrap().is_empty());
        assert_eq!(source.polls(), 3);
    }
}
