//! Binary key layouts.
//!
//! Ids are encoded big-endian so that every record of one user shares an
//! 8-byte prefix and prefix scans stay contiguous.

use gatekeeper_types::{ChatId, UserId};

/// Composite key `user_be ++ chat_be` for the join-request ledger.
pub(crate) fn join_request_key(user: UserId, chat: ChatId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&user.to_key());
    key[8..].copy_from_slice(&chat.to_key());
    key
}

/// Decode an 8-byte big-endian id, rejecting keys of any other length.
pub(crate) fn decode_u64_key(bytes: &[u8]) -> Option<[u8; 8]> {
    bytes.try_into().ok()
}
