//! Canonical invite links in the platform's `t.me` namespace.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypeError;

const ACCEPTED_PREFIXES: [&str; 2] = ["https://t.me/", "http://t.me/"];

/// A validated invite link.
///
/// Public chats are addressed as `https://t.me/<handle>`; private invites as
/// `https://t.me/+<token>` or the legacy `https://t.me/joinchat/<token>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InviteLink(String);

impl InviteLink {
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let trimmed = raw.trim();
        let path = ACCEPTED_PREFIXES
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
            .ok_or_else(|| TypeError::InvalidInviteLink(raw.to_string()))?;
        if first_segment(path).is_empty() {
            return Err(TypeError::InvalidInviteLink(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything after `t.me/`.
    fn path(&self) -> &str {
        ACCEPTED_PREFIXES
            .iter()
            .find_map(|prefix| self.0.strip_prefix(prefix))
            .unwrap_or_default()
    }

    /// Whether this is a private invite token rather than a public handle.
    pub fn is_private(&self) -> bool {
        let segment = first_segment(self.path());
        segment.starts_with('+') || segment.eq_ignore_ascii_case("joinchat")
    }

    /// The public chat handle encoded by the link, if any.
    pub fn public_handle(&self) -> Option<&str> {
        if self.is_private() {
            return None;
        }
        Some(first_segment(self.path()))
    }
}

/// First path segment with any query string removed.
fn first_segment(path: &str) -> &str {
    let no_query = path.split(['?', '#']).next().unwrap_or_default();
    no_query.split('/').next().unwrap_or_default()
}

impl fmt::Display for InviteLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InviteLink {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InviteLink> for String {
    fn from(link: InviteLink) -> Self {
        link.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_link_exposes_handle() {
        let link = InviteLink::parse("https://t.me/PinoyDevs?start=1").unwrap();
        assert!(!link.is_private());
        assert_eq!(link.public_handle(), Some("PinoyDevs"));
    }

    #[test]
    fn private_links_have_no_handle() {
        let plus = InviteLink::parse("https://t.me/+AbCdEf123").unwrap();
        assert!(plus.is_private());
        assert_eq!(plus.public_handle(), None);

        let legacy = InviteLink::parse("http://t.me/joinchat/XYZ").unwrap();
        assert_eq!(legacy.public_handle(), None);
    }

    #[test]
    fn rejects_foreign_namespace_and_empty_path() {
        assert!(InviteLink::parse("https://example.com/group").is_err());
        assert!(InviteLink::parse("https://t.me/").is_err());
        assert!(InviteLink::parse("   ").is_err());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let link = InviteLink::parse("  https://t.me/abc  ").unwrap();
        assert_eq!(link.as_str(), "https://t.me/abc");
    }
}
