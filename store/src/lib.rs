//! Abstract storage traits for the gatekeeper admission bot.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod error;
pub mod group;
pub mod join_request;
pub mod meta;
pub mod verification;

pub use error::StoreError;
pub use group::GroupStore;
pub use join_request::JoinRequestLedger;
pub use meta::MetaStore;
pub use verification::VerificationStore;
