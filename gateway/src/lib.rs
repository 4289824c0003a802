//! The messaging platform as seen by the admission core.
//!
//! [`Gateway`] is the outbound contract the controller drives. [`TelegramClient`]
//! implements it over the Bot API, and [`LongPoller`] turns `getUpdates` into a
//! stream of [`Update`] batches.

pub mod api;
pub mod error;
pub mod poller;
pub mod telegram;
pub mod updates;

pub use api::{ChatMetadata, Gateway};
pub use error::GatewayError;
pub use poller::{LongPoller, UpdateSource, ALLOWED_UPDATES};
pub use telegram::{TelegramClient, TelegramConfig};
pub use updates::{
    Chat, ChatJoinRequest, ChatMember, ChatMemberUpdated, Contact, MemberStatus, Message, Update,
    UpdateKind, User,
};
