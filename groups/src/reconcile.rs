//! Binding a joined chat to its managed group.
//!
//! A group is registered by invite link before the bot ever joins the chat.
//! When the bot is added, the chat is matched against the registry snapshot in
//! three tiers, each evaluated over every group before the next is tried:
//!
//! 1. exported invite link equals the stored link exactly
//! 2. the stored link's public handle equals the chat's handle (case-insensitive)
//! 3. the group name equals the chat title (case-insensitive, low confidence)

use std::fmt;

use gatekeeper_types::{ChatId, ManagedGroup};

/// What the platform told us about a chat the bot has just joined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatIdentity {
    pub chat_id: ChatId,
    pub title: String,
    /// Public handle without `@`, absent for private chats.
    pub public_handle: Option<String>,
    /// Primary invite link, when the bot was allowed to export it.
    pub exported_link: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchMethod {
    InviteLink,
    PublicHandle,
    Title,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchConfidence {
    High,
    Low,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InviteLink => "invite_link",
            Self::PublicHandle => "public_handle",
            Self::Title => "title",
        }
    }

    pub fn confidence(&self) -> MatchConfidence {
        match self {
            Self::InviteLink | Self::PublicHandle => MatchConfidence::High,
            Self::Title => MatchConfidence::Low,
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find the managed group a joined chat corresponds to.
pub fn find_match(
    groups: &[ManagedGroup],
    chat: &ChatIdentity,
) -> Option<(ManagedGroup, MatchMethod)> {
    let by_link = || {
        let exported = chat.exported_link.as_deref()?.trim();
        groups.iter().find(|g| g.link.as_str() == exported)
    };
    let by_handle = || {
        let handle = chat.public_handle.as_deref()?;
        groups.iter().find(|g| {
            g.link
                .public_handle()
                .is_some_and(|stored| stored.eq_ignore_ascii_case(handle))
        })
    };
    let by_title = || {
        let title = chat.title.trim();
        if title.is_empty() {
            return None;
        }
        groups
            .iter()
            .find(|g| g.name.to_lowercase() == title.to_lowercase())
    };

    by_link()
        .map(|g| (g.clone(), MatchMethod::InviteLink))
        .or_else(|| by_handle().map(|g| (g.clone(), MatchMethod::PublicHandle)))
        .or_else(|| by_title().map(|g| (g.clone(), MatchMethod::Title)))
}
