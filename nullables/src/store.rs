//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use gatekeeper_store::{GroupStore, JoinRequestLedger, MetaStore, StoreError, VerificationStore};
use gatekeeper_types::{
    ChatId, GroupId, JoinRequestRecord, JoinStatus, ManagedGroup, NewGroup, PolicyScope,
    Timestamp, UserId, UserProfile, VerifiedUser,
};

#[derive(Default)]
struct State {
    users: BTreeMap<UserId, VerifiedUser>,
    policies: HashMap<PolicyScope, BTreeSet<String>>,
    requests: BTreeMap<(UserId, ChatId), JoinRequestRecord>,
    groups: BTreeMap<GroupId, ManagedGroup>,
    last_group_id: u64,
    schema_version: u32,
}

/// In-memory implementation of every store trait.
///
/// One mutex guards all state, so each operation is atomic. Thread-safe for
/// use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `StoreError::Backend`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store is unavailable".into()));
        }
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl VerificationStore for NullStore {
    fn record_verification(
        &self,
        profile: &UserProfile,
        phone_number: &str,
        region: &str,
        verified_at: Timestamp,
    ) -> Result<VerifiedUser, StoreError> {
        let mut state = self.lock()?;
        let banned = state.users.get(&profile.id).is_some_and(|u| u.banned);
        let record = VerifiedUser {
            user_id: profile.id,
            handle: profile.handle.clone(),
            name: profile.name.clone(),
            phone_number: Some(phone_number.to_string()),
            region: Some(region.to_string()),
            verified_at: Some(verified_at),
            banned,
        };
        state.users.insert(profile.id, record.clone());
        Ok(record)
    }

    fn is_verified_and_not_banned(&self, user: UserId) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .users
            .get(&user)
            .is_some_and(VerifiedUser::is_verified_and_not_banned))
    }

    fn ban(&self, user: UserId) -> Result<(), StoreError> {
        self.lock()?
            .users
            .entry(user)
            .or_insert_with(|| VerifiedUser::banned_placeholder(user))
            .banned = true;
        Ok(())
    }

    fn unban(&self, user: UserId) -> Result<bool, StoreError> {
        match self.lock()?.users.get_mut(&user) {
            Some(record) => {
                record.banned = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn lookup(&self, user: UserId) -> Result<Option<VerifiedUser>, StoreError> {
        Ok(self.lock()?.users.get(&user).cloned())
    }

    fn allowed_codes(&self, scope: PolicyScope) -> Result<Option<BTreeSet<String>>, StoreError> {
        Ok(self.lock()?.policies.get(&scope).cloned())
    }

    fn set_allowed_codes(
        &self,
        scope: PolicyScope,
        codes: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        self.lock()?.policies.insert(scope, codes.clone());
        Ok(())
    }

    fn clear_allowed_codes(&self, scope: PolicyScope) -> Result<bool, StoreError> {
        Ok(self.lock()?.policies.remove(&scope).is_some())
    }

    fn list_policies(&self) -> Result<Vec<(PolicyScope, BTreeSet<String>)>, StoreError> {
        let mut policies: Vec<_> = self
            .lock()?
            .policies
            .iter()
            .map(|(scope, codes)| (*scope, codes.clone()))
            .collect();
        policies.sort_by_key(|(scope, _)| scope.storage_key());
        Ok(policies)
    }

    fn verified_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|u| u.is_verified_and_not_banned())
            .count() as u64)
    }

    fn banned_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.users.values().filter(|u| u.banned).count() as u64)
    }
}

impl JoinRequestLedger for NullStore {
    fn open(
        &self,
        user: UserId,
        chat: ChatId,
        requested_at: Timestamp,
    ) -> Result<JoinRequestRecord, StoreError> {
        let record = JoinRequestRecord {
            user_id: user,
            chat_id: chat,
            requested_at,
            status: JoinStatus::Pending,
        };
        self.lock()?.requests.insert((user, chat), record.clone());
        Ok(record)
    }

    fn set_status(
        &self,
        user: UserId,
        chat: ChatId,
        status: JoinStatus,
    ) -> Result<(), StoreError> {
        match self.lock()?.requests.get_mut(&(user, chat)) {
            Some(record) => {
                record.status = status;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "join request ({user}, {chat})"
            ))),
        }
    }

    fn get(&self, user: UserId, chat: ChatId) -> Result<Option<JoinRequestRecord>, StoreError> {
        Ok(self.lock()?.requests.get(&(user, chat)).cloned())
    }

    fn requests_for_user(&self, user: UserId) -> Result<Vec<JoinRequestRecord>, StoreError> {
        Ok(self
            .lock()?
            .requests
            .range((user, ChatId::new(i64::MIN))..=(user, ChatId::new(i64::MAX)))
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .requests
            .values()
            .filter(|r| r.status == JoinStatus::Pending)
            .count() as u64)
    }
}

impl GroupStore for NullStore {
    fn add_group(&self, group: NewGroup) -> Result<ManagedGroup, StoreError> {
        let mut state = self.lock()?;
        if state.groups.values().any(|g| g.link == group.link) {
            return Err(StoreError::Duplicate(format!("invite link {}", group.link)));
        }
        state.last_group_id += 1;
        let record = group.into_group(GroupId::new(state.last_group_id));
        state.groups.insert(record.id, record.clone());
        Ok(record)
    }

    fn remove_group(&self, id: GroupId) -> Result<Option<ManagedGroup>, StoreError> {
        Ok(self.lock()?.groups.remove(&id))
    }

    fn get_group(&self, id: GroupId) -> Result<Option<ManagedGroup>, StoreError> {
        Ok(self.lock()?.groups.get(&id).cloned())
    }

    fn list_groups(&self) -> Result<Vec<ManagedGroup>, StoreError> {
        Ok(self.lock()?.groups.values().cloned().collect())
    }

    fn bind_chat_id(&self, id: GroupId, chat: ChatId) -> Result<ManagedGroup, StoreError> {
        let mut state = self.lock()?;
        if let Some(owner) = state
            .groups
            .values()
            .find(|g| g.chat_id == Some(chat) && g.id != id)
        {
            return Err(StoreError::Duplicate(format!(
                "chat {chat} is already bound to group {}",
                owner.id
            )));
        }
        let group = state
            .groups
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("group {id}")))?;
        group.chat_id = Some(chat);
        Ok(group.clone())
    }
}

impl MetaStore for NullStore {
    fn get_schema_version(&self) -> Result<u32, StoreError> {
        Ok(self.lock()?.schema_version)
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.lock()?.schema_version = version;
        Ok(())
    }
}
