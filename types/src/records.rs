//! Records owned by the persistent store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ChatId, GroupId, InviteLink, Timestamp, TypeError, UserId};

/// Identity of a platform user as carried on inbound events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    /// Public handle without the leading `@`.
    pub handle: Option<String>,
    pub name: String,
}

impl UserProfile {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            handle: None,
            name: name.into(),
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// `@handle`, or `N/A` when the user has none.
    pub fn display_handle(&self) -> String {
        match &self.handle {
            Some(h) if !h.is_empty() => format!("@{h}"),
            _ => "N/A".to_string(),
        }
    }
}

/// A user's verification record.
///
/// A record created only by a ban carries no phone number and is never
/// considered verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub user_id: UserId,
    pub handle: Option<String>,
    pub name: String,
    /// International-format number as accepted at verification.
    pub phone_number: Option<String>,
    /// ISO 3166 region code that issued `phone_number`.
    pub region: Option<String>,
    pub verified_at: Option<Timestamp>,
    #[serde(default)]
    pub banned: bool,
}

impl VerifiedUser {
    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some() && self.phone_number.is_some()
    }

    pub fn is_verified_and_not_banned(&self) -> bool {
        self.is_verified() && !self.banned
    }

    /// Placeholder for a user banned before ever verifying.
    pub fn banned_placeholder(user_id: UserId) -> Self {
        Self {
            user_id,
            handle: None,
            name: String::new(),
            phone_number: None,
            region: None,
            verified_at: None,
            banned: true,
        }
    }
}

/// Lifecycle of a join request for one (user, chat) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinStatus {
    Pending,
    Approved,
    Declined,
    Error,
}

impl JoinStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "declined" => Ok(Self::Declined),
            "error" => Ok(Self::Error),
            _ => Err(TypeError::InvalidStatus(s.to_string())),
        }
    }
}

/// The outstanding join request for a (user, chat) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequestRecord {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub requested_at: Timestamp,
    pub status: JoinStatus,
}

/// An administratively registered group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedGroup {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub link: InviteLink,
    /// Bound once the bot has joined the chat and reconciliation matched it.
    pub chat_id: Option<ChatId>,
}

/// Validated input for registering a managed group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub link: InviteLink,
}

impl NewGroup {
    pub fn new(name: &str, description: &str, link: &str) -> Result<Self, TypeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TypeError::EmptyField("group name"));
        }
        if link.trim().is_empty() {
            return Err(TypeError::EmptyField("group link"));
        }
        Ok(Self {
            name: name.to_string(),
            description: description.trim().to_string(),
            link: InviteLink::parse(link)?,
        })
    }

    pub fn into_group(self, id: GroupId) -> ManagedGroup {
        ManagedGroup {
            id,
            name: self.name,
            description: self.description,
            link: self.link,
            chat_id: None,
        }
    }
}
