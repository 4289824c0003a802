//! LMDB storage backend for the gatekeeper admission bot.
//!
//! Implements all storage traits from `gatekeeper-store` using the `heed`
//! LMDB bindings. Each logical store maps to one or more LMDB databases
//! within a single environment.

pub mod environment;
pub mod error;
pub mod group;
pub mod integrity;
pub mod join_request;
mod keys;
pub mod meta;
pub mod migration;
pub mod verification;

pub use environment::{LmdbEnvironment, DEFAULT_MAP_SIZE};
pub use error::LmdbError;
pub use group::LmdbGroupStore;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use join_request::LmdbJoinRequestStore;
pub use meta::LmdbMetaStore;
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
pub use verification::LmdbVerificationStore;
