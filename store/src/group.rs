//! Managed-group storage trait.

use crate::StoreError;
use gatekeeper_types::{ChatId, GroupId, ManagedGroup, NewGroup};

/// Trait for administratively registered groups.
///
/// Invite links are unique across groups, as are bound chat ids.
pub trait GroupStore {
    /// Register a group and assign its surrogate id.
    ///
    /// Returns `StoreError::Duplicate` when the link is already registered.
    fn add_group(&self, group: NewGroup) -> Result<ManagedGroup, StoreError>;

    /// Delete a group, returning the removed record if it existed.
    fn remove_group(&self, id: GroupId) -> Result<Option<ManagedGroup>, StoreError>;

    fn get_group(&self, id: GroupId) -> Result<Option<ManagedGroup>, StoreError>;

    /// All groups ordered by id.
    fn list_groups(&self) -> Result<Vec<ManagedGroup>, StoreError>;

    /// Bind a live chat id to a group.
    ///
    /// Rebinding the same pair is a no-op. Returns `StoreError::Duplicate`
    /// when the chat is already bound to a different group and
    /// `StoreError::NotFound` for an unknown group.
    fn bind_chat_id(&self, id: GroupId, chat: ChatId) -> Result<ManagedGroup, StoreError>;

    fn group_count(&self) -> Result<u64, StoreError> {
        self.list_groups().map(|g| g.len() as u64)
    }
}
