//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::group::LmdbGroupStore;
use crate::join_request::LmdbJoinRequestStore;
use crate::meta::LmdbMetaStore;
use crate::migration::Migrator;
use crate::verification::LmdbVerificationStore;
use crate::LmdbError;

/// Names of every database this backend creates.
pub const DATABASE_NAMES: &[&str] = &[
    "users",
    "policies",
    "join_requests",
    "groups",
    "group_links",
    "group_chats",
    "meta",
];

/// Default map size: 256 MiB is ample for user and request records.
pub const DEFAULT_MAP_SIZE: usize = 256 * 1024 * 1024;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    pub(crate) env: Arc<Env>,
    pub(crate) users_db: Database<Bytes, Bytes>,
    pub(crate) policies_db: Database<Bytes, Bytes>,
    pub(crate) join_requests_db: Database<Bytes, Bytes>,
    pub(crate) groups_db: Database<Bytes, Bytes>,
    pub(crate) group_links_db: Database<Bytes, Bytes>,
    pub(crate) group_chats_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path and bring its
    /// schema up to date.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        let mut options = EnvOpenOptions::new();
        options
            .map_size(map_size)
            .max_dbs(DATABASE_NAMES.len() as u32);
        // SAFETY: the environment is opened once per process and the data
        // directory is not shared with other processes.
        let env = unsafe { options.open(path)? };

        let mut wtxn = env.write_txn()?;
        let users_db = env.create_database(&mut wtxn, Some("users"))?;
        let policies_db = env.create_database(&mut wtxn, Some("policies"))?;
        let join_requests_db = env.create_database(&mut wtxn, Some("join_requests"))?;
        let groups_db = env.create_database(&mut wtxn, Some("groups"))?;
        let group_links_db = env.create_database(&mut wtxn, Some("group_links"))?;
        let group_chats_db = env.create_database(&mut wtxn, Some("group_chats"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            users_db,
            policies_db,
            join_requests_db,
            groups_db,
            group_links_db,
            group_chats_db,
            meta_db,
        };

        Migrator::run(&environment.meta_store())?;
        tracing::info!(path = %path.display(), "opened LMDB environment");
        Ok(environment)
    }

    pub fn verification_store(&self) -> LmdbVerificationStore {
        LmdbVerificationStore {
            env: Arc::clone(&self.env),
            users_db: self.users_db,
            policies_db: self.policies_db,
        }
    }

    pub fn join_request_store(&self) -> LmdbJoinRequestStore {
        LmdbJoinRequestStore {
            env: Arc::clone(&self.env),
            join_requests_db: self.join_requests_db,
        }
    }

    pub fn group_store(&self) -> LmdbGroupStore {
        LmdbGroupStore {
            env: Arc::clone(&self.env),
            groups_db: self.groups_db,
            group_links_db: self.group_links_db,
            group_chats_db: self.group_chats_db,
            meta_db: self.meta_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }
}
