//! LMDB implementation of GroupStore.
//!
//! Groups are keyed by big-endian surrogate id, so iteration yields id order.
//! Two index databases enforce uniqueness: `group_links` (link → id) and
//! `group_chats` (chat id → id). Records and indexes change in the same
//! write transaction.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};

use gatekeeper_store::{GroupStore, StoreError};
use gatekeeper_types::{ChatId, GroupId, ManagedGroup, NewGroup};

use crate::keys::decode_u64_key;
use crate::LmdbError;

pub(crate) const NEXT_GROUP_ID_KEY: &[u8] = b"next_group_id";

pub struct LmdbGroupStore {
    pub(crate) env: Arc<Env>,
    pub(crate) groups_db: Database<Bytes, Bytes>,
    pub(crate) group_links_db: Database<Bytes, Bytes>,
    pub(crate) group_chats_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbGroupStore {
    fn read_group(&self, txn: &RoTxn, id: GroupId) -> Result<Option<ManagedGroup>, LmdbError> {
        match self.groups_db.get(txn, &id.to_key())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn write_group(&self, txn: &mut RwTxn, group: &ManagedGroup) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(group)?;
        self.groups_db.put(txn, &group.id.to_key(), &bytes)?;
        Ok(())
    }

    fn indexed_id(
        &self,
        txn: &RoTxn,
        index: &Database<Bytes, Bytes>,
        key: &[u8],
    ) -> Result<Option<GroupId>, LmdbError> {
        match index.get(txn, key)? {
            Some(bytes) => decode_u64_key(bytes)
                .map(|raw| Some(GroupId::from_key(raw)))
                .ok_or_else(|| LmdbError::Serialization("malformed group index entry".into())),
            None => Ok(None),
        }
    }

    /// Allocate the next surrogate id (ids start at 1 and are never reused).
    fn allocate_id(&self, txn: &mut RwTxn) -> Result<GroupId, LmdbError> {
        let next = match self.meta_db.get(txn, NEXT_GROUP_ID_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("next_group_id has unexpected byte length".into())
                })?;
                u64::from_le_bytes(arr)
            }
            None => 1,
        };
        self.meta_db
            .put(txn, NEXT_GROUP_ID_KEY, &(next + 1).to_le_bytes())?;
        Ok(GroupId::new(next))
    }
}

impl GroupStore for LmdbGroupStore {
    fn add_group(&self, group: NewGroup) -> Result<ManagedGroup, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let link_key = group.link.as_str().as_bytes().to_vec();
        if self
            .indexed_id(&wtxn, &self.group_links_db, &link_key)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("invite link {}", group.link)));
        }

        let id = self.allocate_id(&mut wtxn)?;
        let record = group.into_group(id);
        self.write_group(&mut wtxn, &record)?;
        self.group_links_db
            .put(&mut wtxn, &link_key, &id.to_key())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::debug!(group_id = %id, link = %record.link, "stored managed group");
        Ok(record)
    }

    fn remove_group(&self, id: GroupId) -> Result<Option<ManagedGroup>, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let Some(group) = self.read_group(&wtxn, id)? else {
            return Ok(None);
        };
        self.groups_db
            .delete(&mut wtxn, &id.to_key())
            .map_err(LmdbError::from)?;
        self.group_links_db
            .delete(&mut wtxn, group.link.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        if let Some(chat) = group.chat_id {
            self.group_chats_db
                .delete(&mut wtxn, &chat.to_key())
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(Some(group))
    }

    fn get_group(&self, id: GroupId) -> Result<Option<ManagedGroup>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_group(&rtxn, id)?)
    }

    fn list_groups(&self) -> Result<Vec<ManagedGroup>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut groups = Vec::new();
        for result in self.groups_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = result.map_err(LmdbError::from)?;
            groups.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(groups)
    }

    fn bind_chat_id(&self, id: GroupId, chat: ChatId) -> Result<ManagedGroup, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut group = self
            .read_group(&wtxn, id)?
            .ok_or_else(|| StoreError::NotFound(format!("group {id}")))?;

        match self.indexed_id(&wtxn, &self.group_chats_db, &chat.to_key())? {
            Some(owner) if owner != id => {
                return Err(StoreError::Duplicate(format!(
                    "chat {chat} is already bound to group {owner}"
                )));
            }
            Some(_) => return Ok(group),
            None => {}
        }

        if let Some(previous) = group.chat_id {
            self.group_chats_db
                .delete(&mut wtxn, &previous.to_key())
                .map_err(LmdbError::from)?;
        }
        group.chat_id = Some(chat);
        self.write_group(&mut wtxn, &group)?;
        self.group_chats_db
            .put(&mut wtxn, &chat.to_key(), &id.to_key())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(group)
    }

    fn group_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.groups_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    fn temp_store() -> (tempfile::TempDir, LmdbGroupStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).expect("open env");
        (dir, env.group_store())
    }

    fn new_group(name: &str, link: &str) -> NewGroup {
        NewGroup::new(name, "desc", link).unwrap()
    }

    #[test]
    fn ids_are_sequential_and_listing_is_ordered() {
        let (_dir, store) = temp_store();
        let a = store.add_group(new_group("A", "https://t.me/a")).unwrap();
        let b = store.add_group(new_group("B", "https://t.me/b")).unwrap();
        assert_eq!(a.id, GroupId::new(1));
        assert_eq!(b.id, GroupId::new(2));
        let names: Vec<_> = store
            .list_groups()
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn duplicate_link_is_rejected_without_mutation() {
        let (_dir, store) = temp_store();
        store.add_group(new_group("A", "https://t.me/a")).unwrap();
        let err = store.add_group(new_group("A2", "https://t.me/a")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.group_count().unwrap(), 1);
    }

    #[test]
    fn chat_ids_are_unique_across_groups() {
        let (_dir, store) = temp_store();
        let a = store.add_group(new_group("A", "https://t.me/a")).unwrap();
        let b = store.add_group(new_group("B", "https://t.me/b")).unwrap();
        let chat = ChatId::new(-100_123);

        let bound = store.bind_chat_id(a.id, chat).unwrap();
        assert_eq!(bound.chat_id, Some(chat));
        assert!(store.bind_chat_id(a.id, chat).is_ok());
        assert!(matches!(
            store.bind_chat_id(b.id, chat),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn removing_group_frees_link_and_chat() {
        let (_dir, store) = temp_store();
        let a = store.add_group(new_group("A", "https://t.me/a")).unwrap();
        store.bind_chat_id(a.id, ChatId::new(-5)).unwrap();
        let removed = store.remove_group(a.id).unwrap().unwrap();
        assert_eq!(removed.name, "A");
        assert!(store.remove_group(a.id).unwrap().is_none());

        let again = store.add_group(new_group("A", "https://t.me/a")).unwrap();
        assert_eq!(again.id, GroupId::new(2));
        assert!(store.bind_chat_id(again.id, ChatId::new(-5)).is_ok());
    }
}
