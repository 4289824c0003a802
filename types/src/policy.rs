//! Country policy scopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ChatId, TypeError};

/// Key under which an allowlist of region codes is stored.
///
/// A chat's own scope takes precedence; `Default` applies to every chat
/// without one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyScope {
    Default,
    Chat(ChatId),
}

impl PolicyScope {
    pub const DEFAULT_KEY: &'static str = "default";

    pub fn storage_key(&self) -> String {
        match self {
            Self::Default => Self::DEFAULT_KEY.to_string(),
            Self::Chat(chat) => format!("chat:{chat}"),
        }
    }

    /// Inverse of [`PolicyScope::storage_key`].
    pub fn from_storage_key(key: &str) -> Result<Self, TypeError> {
        if key == Self::DEFAULT_KEY {
            return Ok(Self::Default);
        }
        key.strip_prefix("chat:")
            .and_then(|raw| raw.parse::<ChatId>().ok())
            .map(Self::Chat)
            .ok_or_else(|| TypeError::InvalidScope(key.to_string()))
    }
}

impl fmt::Display for PolicyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str(Self::DEFAULT_KEY),
            Self::Chat(chat) => write!(f, "{chat}"),
        }
    }
}

impl FromStr for PolicyScope {
    type Err = TypeError;

    /// Accepts `default` or a numeric chat id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(Self::DEFAULT_KEY) {
            return Ok(Self::Default);
        }
        s.parse::<ChatId>()
            .map(Self::Chat)
            .map_err(|_| TypeError::InvalidScope(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_and_chat_scopes() {
        assert_eq!("DEFAULT".parse::<PolicyScope>().unwrap(), PolicyScope::Default);
        assert_eq!(
            "-1009".parse::<PolicyScope>().unwrap(),
            PolicyScope::Chat(ChatId::new(-1009))
        );
        assert!("global".parse::<PolicyScope>().is_err());
    }

    #[test]
    fn storage_keys_are_distinct_and_reversible() {
        let chat = PolicyScope::Chat(ChatId::new(-1001));
        assert_ne!(PolicyScope::Default.storage_key(), chat.storage_key());
        assert_eq!(PolicyScope::from_storage_key(&chat.storage_key()).unwrap(), chat);
        assert!(PolicyScope::from_storage_key("chat:zero").is_err());
    }
}
