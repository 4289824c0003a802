//! LMDB implementation of JoinRequestLedger.
//!
//! Key format: `user_be ++ chat_be` (see [`crate::keys`]). Listing a user's
//! requests is a prefix scan over the user's 8-byte id.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use gatekeeper_store::{JoinRequestLedger, StoreError};
use gatekeeper_types::{ChatId, JoinRequestRecord, JoinStatus, Timestamp, UserId};

use crate::keys::join_request_key;
use crate::LmdbError;

pub struct LmdbJoinRequestStore {
    pub(crate) env: Arc<Env>,
    pub(crate) join_requests_db: Database<Bytes, Bytes>,
}

impl JoinRequestLedger for LmdbJoinRequestStore {
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
        let bytes = bincode::serialize(&record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.join_requests_db
            .put(&mut wtxn, &join_request_key(user, chat), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(record)
    }

    fn set_status(
        &self,
        user: UserId,
        chat: ChatId,
        status: JoinStatus,
    ) -> Result<(), StoreError> {
        let key = join_request_key(user, chat);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut record: JoinRequestRecord = match self
            .join_requests_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => bincode::deserialize(bytes).map_err(LmdbError::from)?,
            None => {
                return Err(LmdbError::NotFound(format!(
                    "join request ({user}, {chat})"
                ))
                .into())
            }
        };
        record.status = status;
        let bytes = bincode::serialize(&record).map_err(LmdbError::from)?;
        self.join_requests_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get(&self, user: UserId, chat: ChatId) -> Result<Option<JoinRequestRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .join_requests_db
            .get(&rtxn, &join_request_key(user, chat))
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(bytes).map_err(LmdbError::from)?,
            )),
            None => Ok(None),
        }
    }

    fn requests_for_user(&self, user: UserId) -> Result<Vec<JoinRequestRecord>, StoreError> {
        let prefix = user.to_key();
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self
            .join_requests_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?;
        let mut records: Vec<JoinRequestRecord> = Vec::new();
        for result in iter {
            let (_key, val) = result.map_err(LmdbError::from)?;
            records.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        // Big-endian two's complement puts negative chat ids last.
        records.sort_by_key(|r| r.chat_id);
        Ok(records)
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut count = 0u64;
        for result in self.join_requests_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = result.map_err(LmdbError::from)?;
            let record: JoinRequestRecord =
                bincode::deserialize(val).map_err(LmdbError::from)?;
            if record.status == JoinStatus::Pending {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    fn temp_store() -> (tempfile::TempDir, LmdbJoinRequestStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).expect("open env");
        (dir, env.join_request_store())
    }

    #[test]
    fn reopen_resets_terminal_status_and_timestamp() {
        let (_dir, store) = temp_store();
        let (user, chat) = (UserId::new(5), ChatId::new(-100));
        store.open(user, chat, Timestamp::new(10)).unwrap();
        store.set_status(user, chat, JoinStatus::Error).unwrap();

        store.open(user, chat, Timestamp::new(50)).unwrap();
        let record = store.get(user, chat).unwrap().unwrap();
        assert_eq!(record.status, JoinStatus::Pending);
        assert_eq!(record.requested_at, Timestamp::new(50));
    }

    #[test]
    fn pending_for_user_is_scoped_to_the_user() {
        let (_dir, store) = temp_store();
        let alice = UserId::new(1);
        let bob = UserId::new(2);
        store.open(alice, ChatId::new(-200), Timestamp::new(1)).unwrap();
        store.open(alice, ChatId::new(-100), Timestamp::new(1)).unwrap();
        store.open(alice, ChatId::new(300), Timestamp::new(1)).unwrap();
        store.open(bob, ChatId::new(-100), Timestamp::new(1)).unwrap();
        store
            .set_status(alice, ChatId::new(300), JoinStatus::Approved)
            .unwrap();

        assert_eq!(
            store.pending_for_user(alice).unwrap(),
            vec![ChatId::new(-200), ChatId::new(-100)]
        );
        assert_eq!(store.pending_count().unwrap(), 3);
    }

    #[test]
    fn set_status_on_missing_pair_is_not_found() {
        let (_dir, store) = temp_store();
        let err = store
            .set_status(UserId::new(1), ChatId::new(1), JoinStatus::Approved)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
