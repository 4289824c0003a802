//! Platform and storage identifiers.
//!
//! `UserId` and `ChatId` mirror the messaging platform's signed 64-bit ids
//! (supergroup ids are negative). `GroupId` is the surrogate key of a
//! [`ManagedGroup`](crate::ManagedGroup) and is assigned by the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypeError;

/// A platform user id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    /// Big-endian bytes, used as a storage key so that range scans group by user.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(bytes: [u8; 8]) -> Self {
        Self(i64::from_be_bytes(bytes))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| TypeError::InvalidUserId(s.to_string()))?;
        if raw <= 0 {
            return Err(TypeError::InvalidUserId(s.to_string()));
        }
        Ok(Self(raw))
    }
}

/// A live platform chat id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(i64);

impl ChatId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(bytes: [u8; 8]) -> Self {
        Self(i64::from_be_bytes(bytes))
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChatId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| TypeError::InvalidChatId(s.to_string()))?;
        if raw == 0 {
            return Err(TypeError::InvalidChatId(s.to_string()));
        }
        Ok(Self(raw))
    }
}

/// Surrogate id of a managed group record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u64);

impl GroupId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| TypeError::InvalidGroupId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_non_positive() {
        assert!("0".parse::<UserId>().is_err());
        assert!("-5".parse::<UserId>().is_err());
        assert!("abc".parse::<UserId>().is_err());
        assert_eq!(" 42 ".parse::<UserId>().unwrap(), UserId::new(42));
    }

    #[test]
    fn chat_id_accepts_negative_supergroup_ids() {
        let id: ChatId = "-1001234567890".parse().unwrap();
        assert_eq!(id.get(), -1_001_234_567_890);
        assert!("0".parse::<ChatId>().is_err());
    }

    #[test]
    fn key_encoding_round_trips_negative_ids() {
        let id = ChatId::new(-100);
        assert_eq!(ChatId::from_key(id.to_key()), id);
    }
}
