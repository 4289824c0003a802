//! Join-request ledger trait.

use crate::StoreError;
use gatekeeper_types::{ChatId, JoinRequestRecord, JoinStatus, Timestamp, UserId};

/// Trait for the lifecycle record of join requests.
///
/// Keys are `(user, chat)` pairs with at most one record per pair. Every
/// write is atomic at the single-record level.
pub trait JoinRequestLedger {
    /// Upsert the pair to `Pending` stamped with `requested_at`, whatever its
    /// previous status was.
    fn open(
        &self,
        user: UserId,
        chat: ChatId,
        requested_at: Timestamp,
    ) -> Result<JoinRequestRecord, StoreError>;

    /// Update the status of an existing pair.
    ///
    /// Returns `StoreError::NotFound` when the pair has no record.
    fn set_status(&self, user: UserId, chat: ChatId, status: JoinStatus)
        -> Result<(), StoreError>;

    fn get(&self, user: UserId, chat: ChatId) -> Result<Option<JoinRequestRecord>, StoreError>;

    /// Chats in which the user has a `Pending` request, in chat id order.
    fn pending_for_user(&self, user: UserId) -> Result<Vec<ChatId>, StoreError> {
        Ok(self
            .requests_for_user(user)?
            .into_iter()
            .filter(|r| r.status == JoinStatus::Pending)
            .map(|r| r.chat_id)
            .collect())
    }

    /// Every record for the user, in chat id order.
    fn requests_for_user(&self, user: UserId) -> Result<Vec<JoinRequestRecord>, StoreError>;

    /// Number of `Pending` records across all users.
    fn pending_count(&self) -> Result<u64, StoreError>;
}
