//! LMDB implementation of VerificationStore.
//!
//! Users are keyed by their big-endian id; policies by
//! [`PolicyScope::storage_key`]. Every read-modify-write happens inside a
//! single write transaction, and LMDB serialises writers, so a ban and a
//! verification for the same user never interleave.

use std::collections::BTreeSet;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RwTxn};

use gatekeeper_store::{StoreError, VerificationStore};
use gatekeeper_types::{PolicyScope, Timestamp, UserId, UserProfile, VerifiedUser};

use crate::LmdbError;

pub struct LmdbVerificationStore {
    pub(crate) env: Arc<Env>,
    pub(crate) users_db: Database<Bytes, Bytes>,
    pub(crate) policies_db: Database<Bytes, Bytes>,
}

impl LmdbVerificationStore {
    fn read_user(&self, txn: &heed::RoTxn, user: UserId) -> Result<Option<VerifiedUser>, LmdbError> {
        match self.users_db.get(txn, &user.to_key())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn write_user(&self, txn: &mut RwTxn, record: &VerifiedUser) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(record)?;
        self.users_db.put(txn, &record.user_id.to_key(), &bytes)?;
        Ok(())
    }

    fn all_users(&self) -> Result<Vec<VerifiedUser>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let mut users = Vec::new();
        for result in self.users_db.iter(&rtxn)? {
            let (_key, val) = result?;
            users.push(bincode::deserialize(val)?);
        }
        Ok(users)
    }
}

impl VerificationStore for LmdbVerificationStore {
    fn record_verification(
        &self,
        profile: &UserProfile,
        phone_number: &str,
        region: &str,
        verified_at: Timestamp,
    ) -> Result<VerifiedUser, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let banned = self
            .read_user(&wtxn, profile.id)?
            .map(|existing| existing.banned)
            .unwrap_or(false);
        let record = VerifiedUser {
            user_id: profile.id,
            handle: profile.handle.clone(),
            name: profile.name.clone(),
            phone_number: Some(phone_number.to_string()),
            region: Some(region.to_string()),
            verified_at: Some(verified_at),
            banned,
        };
        self.write_user(&mut wtxn, &record)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(record)
    }

    fn is_verified_and_not_banned(&self, user: UserId) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self
            .read_user(&rtxn, user)?
            .is_some_and(|u| u.is_verified_and_not_banned()))
    }

    fn ban(&self, user: UserId) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let record = match self.read_user(&wtxn, user)? {
            Some(mut existing) => {
                existing.banned = true;
                existing
            }
            None => VerifiedUser::banned_placeholder(user),
        };
        self.write_user(&mut wtxn, &record)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn unban(&self, user: UserId) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let Some(mut existing) = self.read_user(&wtxn, user)? else {
            return Ok(false);
        };
        existing.banned = false;
        self.write_user(&mut wtxn, &existing)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn lookup(&self, user: UserId) -> Result<Option<VerifiedUser>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_user(&rtxn, user)?)
    }

    fn allowed_codes(&self, scope: PolicyScope) -> Result<Option<BTreeSet<String>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let key = scope.storage_key();
        match self
            .policies_db
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(bytes).map_err(LmdbError::from)?,
            )),
            None => Ok(None),
        }
    }

    fn set_allowed_codes(
        &self,
        scope: PolicyScope,
        codes: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        let bytes = bincode::serialize(codes).map_err(LmdbError::from)?;
        let key = scope.storage_key();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.policies_db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn clear_allowed_codes(&self, scope: PolicyScope) -> Result<bool, StoreError> {
        let key = scope.storage_key();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let existed = self
            .policies_db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(existed)
    }

    fn list_policies(&self) -> Result<Vec<(PolicyScope, BTreeSet<String>)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut policies = Vec::new();
        for result in self.policies_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, val) = result.map_err(LmdbError::from)?;
            let key = std::str::from_utf8(key)
                .map_err(|e| StoreError::Corruption(format!("policy key: {e}")))?;
            let scope = PolicyScope::from_storage_key(key)
                .map_err(|e| StoreError::Corruption(e.to_string()))?;
            let codes = bincode::deserialize(val).map_err(LmdbError::from)?;
            policies.push((scope, codes));
        }
        Ok(policies)
    }

    fn verified_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .all_users()?
            .iter()
            .filter(|u| u.is_verified_and_not_banned())
            .count() as u64)
    }

    fn banned_count(&self) -> Result<u64, StoreError> {
        Ok(self.all_users()?.iter().filter(|u| u.banned).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    fn temp_store() -> (tempfile::TempDir, LmdbVerificationStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).expect("open env");
        (dir, env.verification_store())
    }

    fn profile(id: i64) -> UserProfile {
        UserProfile::new(UserId::new(id), "Juan").with_handle("juan")
    }

    #[test]
    fn reverification_keeps_one_record_with_latest_timestamp() {
        let (_dir, store) = temp_store();
        store
            .record_verification(&profile(1), "+63 917 123 4567", "PH", Timestamp::new(10))
            .unwrap();
        store
            .record_verification(&profile(1), "+63 917 123 4567", "PH", Timestamp::new(20))
            .unwrap();
        let user = store.lookup(UserId::new(1)).unwrap().unwrap();
        assert_eq!(user.verified_at, Some(Timestamp::new(20)));
        assert_eq!(store.verified_count().unwrap(), 1);
    }

    #[test]
    fn reverification_does_not_clear_ban() {
        let (_dir, store) = temp_store();
        store
            .record_verification(&profile(2), "+63 917 000 0000", "PH", Timestamp::new(1))
            .unwrap();
        store.ban(UserId::new(2)).unwrap();
        store
            .record_verification(&profile(2), "+63 917 000 0000", "PH", Timestamp::new(2))
            .unwrap();
        assert!(!store.is_verified_and_not_banned(UserId::new(2)).unwrap());
        assert!(store.unban(UserId::new(2)).unwrap());
        assert!(store.is_verified_and_not_banned(UserId::new(2)).unwrap());
    }

    #[test]
    fn banning_unknown_user_blocks_later_verification() {
        let (_dir, store) = temp_store();
        store.ban(UserId::new(3)).unwrap();
        assert_eq!(store.banned_count().unwrap(), 1);
        store
            .record_verification(&profile(3), "+63 917 111 1111", "PH", Timestamp::new(5))
            .unwrap();
        assert!(!store.is_verified_and_not_banned(UserId::new(3)).unwrap());
    }

    #[test]
    fn policies_are_scoped_and_clearable() {
        let (_dir, store) = temp_store();
        let chat = PolicyScope::Chat(gatekeeper_types::ChatId::new(-100));
        let ph: BTreeSet<String> = ["PH".to_string()].into();
        let jp: BTreeSet<String> = ["JP".to_string(), "PH".to_string()].into();
        store.set_allowed_codes(PolicyScope::Default, &ph).unwrap();
        store.set_allowed_codes(chat, &jp).unwrap();

        assert_eq!(store.allowed_codes(chat).unwrap(), Some(jp));
        assert_eq!(store.list_policies().unwrap().len(), 2);
        assert!(store.clear_allowed_codes(chat).unwrap());
        assert_eq!(store.allowed_codes(chat).unwrap(), None);
        assert!(!store.clear_allowed_codes(chat).unwrap());
    }
}
