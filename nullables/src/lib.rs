//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the admission core (clock, persistent
//! store, messaging platform, update feed) is abstracted behind a trait. This
//! crate provides test implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including injected failures
//! - Record what was asked of them for later assertions
//! - Never touch the filesystem or network

pub mod clock;
pub mod gateway;
pub mod store;
pub mod updates;

pub use clock::NullClock;
pub use gateway::{GatewayCall, NullGateway};
pub use store::NullStore;
pub use updates::ScriptedUpdates;
