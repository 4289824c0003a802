//! Managed groups as seen by the admission core.
//!
//! - [`GroupRegistry`] keeps an immutable snapshot of every managed group,
//!   rebuilt from the group store on demand and swapped in whole.
//! - [`find_match`] binds a chat the bot has just joined to the managed group
//!   it most likely corresponds to.

pub mod error;
pub mod reconcile;
pub mod registry;

pub use error::GroupError;
pub use reconcile::{find_match, ChatIdentity, MatchConfidence, MatchMethod};
pub use registry::GroupRegistry;
