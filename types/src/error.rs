//! Errors raised while constructing validated values.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid chat id: {0}")]
    InvalidChatId(String),

    #[error("invalid group id: {0}")]
    InvalidGroupId(String),

    #[error("invite link must start with https://t.me/ or http://t.me/: {0}")]
    InvalidInviteLink(String),

    #[error("invalid policy scope: {0}")]
    InvalidScope(String),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("invalid join status: {0}")]
    InvalidStatus(String),
}
