//! Startup consistency check for the admission schema.
//!
//! Every row must decode and sit under the key its contents imply. The
//! `group_links` and `group_chats` indexes must agree with the `groups`
//! records in both directions, so one link and one chat never resolve to two
//! groups. Findings are collected into an [`IntegrityReport`]; only failing to
//! open the read transaction is a hard error.

use std::collections::BTreeSet;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, RoTxn};

use gatekeeper_types::{GroupId, JoinRequestRecord, ManagedGroup, PolicyScope, VerifiedUser};

use crate::group::NEXT_GROUP_ID_KEY;
use crate::keys::{decode_u64_key, join_request_key};
use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }

    /// Visit every row of `db`, counting it and recording what `check` rejects.
    fn scan<F>(&mut self, txn: &RoTxn, name: &str, db: Database<Bytes, Bytes>, mut check: F)
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), String>,
    {
        self.databases_checked += 1;
        let rows = match db.iter(txn) {
            Ok(rows) => rows,
            Err(e) => {
                self.errors.push(format!("{name}: cannot be read: {e}"));
                return;
            }
        };
        for row in rows {
            match row {
                Ok((key, value)) => {
                    self.total_entries += 1;
                    if let Err(problem) = check(key, value) {
                        self.errors.push(format!("{name}: {problem}"));
                    }
                }
                Err(e) => {
                    self.errors.push(format!("{name}: scan aborted: {e}"));
                    return;
                }
            }
        }
    }
}

/// Check every database of an opened environment.
pub fn check_integrity(environment: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let rtxn = environment.env.read_txn()?;
    let mut report = IntegrityReport::default();

    report.scan(&rtxn, "users", environment.users_db, |key, value| {
        let record: VerifiedUser =
            bincode::deserialize(value).map_err(|e| format!("undecodable record: {e}"))?;
        if key != record.user_id.to_key().as_slice() {
            return Err(format!("user {} stored under a foreign key", record.user_id));
        }
        Ok(())
    });

    report.scan(&rtxn, "policies", environment.policies_db, |key, value| {
        let key = std::str::from_utf8(key).map_err(|e| format!("key is not text: {e}"))?;
        PolicyScope::from_storage_key(key).map_err(|e| format!("{key}: {e}"))?;
        bincode::deserialize::<BTreeSet<String>>(value)
            .map_err(|e| format!("{key}: undecodable codes: {e}"))?;
        Ok(())
    });

    report.scan(&rtxn, "join_requests", environment.join_requests_db, |key, value| {
        let record: JoinRequestRecord =
            bincode::deserialize(value).map_err(|e| format!("undecodable record: {e}"))?;
        if key != join_request_key(record.user_id, record.chat_id).as_slice() {
            return Err(format!(
                "request of user {} in chat {} stored under a foreign key",
                record.user_id, record.chat_id
            ));
        }
        Ok(())
    });

    let mut highest_group: Option<GroupId> = None;
    report.scan(&rtxn, "groups", environment.groups_db, |key, value| {
        let group: ManagedGroup =
            bincode::deserialize(value).map_err(|e| format!("undecodable record: {e}"))?;
        if key != group.id.to_key().as_slice() {
            return Err(format!("group {} stored under a foreign key", group.id));
        }
        highest_group = highest_group.max(Some(group.id));

        let link = group.link.as_str().as_bytes();
        match indexed_group(&rtxn, environment.group_links_db, link)? {
            Some(owner) if owner == group.id => {}
            Some(owner) => {
                return Err(format!("link of group {} is indexed to group {owner}", group.id))
            }
            None => return Err(format!("link of group {} is not indexed", group.id)),
        }
        if let Some(chat) = group.chat_id {
            match indexed_group(&rtxn, environment.group_chats_db, &chat.to_key())? {
                Some(owner) if owner == group.id => {}
                Some(owner) => {
                    return Err(format!("chat {chat} of group {} is indexed to group {owner}", group.id))
                }
                None => return Err(format!("chat {chat} of group {} is not indexed", group.id)),
            }
        }
        Ok(())
    });

    report.scan(&rtxn, "group_links", environment.group_links_db, |key, value| {
        let label = String::from_utf8_lossy(key);
        let group = index_target(&rtxn, environment.groups_db, value)
            .map_err(|problem| format!("{label}: {problem}"))?;
        if group.link.as_str().as_bytes() != key {
            return Err(format!("{label} points at group {} with link {}", group.id, group.link));
        }
        Ok(())
    });

    report.scan(&rtxn, "group_chats", environment.group_chats_db, |key, value| {
        let group = index_target(&rtxn, environment.groups_db, value)?;
        let bound = group.chat_id.map(|chat| chat.to_key());
        if bound.as_ref().map(|k| k.as_slice()) != Some(key) {
            return Err(format!("entry points at group {} which is bound elsewhere", group.id));
        }
        Ok(())
    });

    report.scan(&rtxn, "meta", environment.meta_db, |key, value| {
        if key != NEXT_GROUP_ID_KEY {
            return Ok(());
        }
        let next = decode_u64_key(value)
            .map(u64::from_le_bytes)
            .ok_or("next_group_id has unexpected byte length")?;
        match highest_group {
            Some(highest) if GroupId::new(next) <= highest => Err(format!(
                "next_group_id {next} would reuse the id of group {highest}"
            )),
            _ => Ok(()),
        }
    });

    Ok(report)
}

/// Group id an index maps `key` to.
fn indexed_group(
    txn: &RoTxn,
    index: Database<Bytes, Bytes>,
    key: &[u8],
) -> Result<Option<GroupId>, String> {
    match index.get(txn, key).map_err(|e| e.to_string())? {
        Some(bytes) => decode_u64_key(bytes)
            .map(|raw| Some(GroupId::from_key(raw)))
            .ok_or_else(|| "malformed index entry".to_string()),
        None => Ok(None),
    }
}

/// Group record an index value refers to.
fn index_target(
    txn: &RoTxn,
    groups: Database<Bytes, Bytes>,
    value: &[u8],
) -> Result<ManagedGroup, String> {
    let raw = decode_u64_key(value).ok_or("malformed index entry")?;
    let id = GroupId::from_key(raw);
    let bytes = groups
        .get(txn, &raw)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("points at missing group {id}"))?;
    bincode::deserialize(bytes).map_err(|e| format!("group {id} is undecodable: {e}"))
}

/// Refuse a data directory that holds files but no LMDB data file.
///
/// A missing or empty directory is a fresh start.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() || path.join("data.mdb").exists() {
        return Ok(());
    }
    let mut entries = std::fs::read_dir(path)
        .map_err(|e| format!("cannot read data directory {}: {e}", path.display()))?;
    match entries.next() {
        None => Ok(()),
        Some(_) => Err(format!(
            "data directory {} is not empty but holds no data.mdb",
            path.display()
        )),
    }
}
