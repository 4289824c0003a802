//! Fundamental types for the gatekeeper admission bot.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! platform identifiers, timestamps, the persisted records, country policy
//! scopes and invite links.

pub mod error;
pub mod ids;
pub mod link;
pub mod policy;
pub mod records;
pub mod time;

pub use error::TypeError;
pub use ids::{ChatId, GroupId, UserId};
pub use link::InviteLink;
pub use policy::PolicyScope;
pub use records::{
    JoinRequestRecord, JoinStatus, ManagedGroup, NewGroup, UserProfile, VerifiedUser,
};
pub use time::{Clock, SystemClock, Timestamp};
