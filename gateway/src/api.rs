//! Outbound platform operations consumed by the admission core.

use async_trait::async_trait;
use gatekeeper_types::{ChatId, UserId};

use crate::GatewayError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMetadata {
    pub title: String,
    /// Public handle without `@`, absent for private chats.
    pub public_handle: Option<String>,
}

/// Every call reports its own success or failure; nothing is retried here.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn approve_join_request(&self, chat: ChatId, user: UserId) -> Result<(), GatewayError>;

    async fn decline_join_request(&self, chat: ChatId, user: UserId) -> Result<(), GatewayError>;

    async fn send_direct_message(&self, user: UserId, text: &str) -> Result<(), GatewayError>;

    /// Direct message carrying a one-tap "share my phone number" keyboard.
    async fn prompt_contact(&self, user: UserId, text: &str) -> Result<(), GatewayError>;

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), GatewayError>;

    /// The chat's primary invite link. An error means the link is unavailable.
    async fn export_invite_link(&self, chat: ChatId) -> Result<String, GatewayError>;

    async fn get_chat_metadata(&self, chat: ChatId) -> Result<ChatMetadata, GatewayError>;
}
