//! Admission bot core.
//!
//! The bot admits users to managed group chats once they have proven control
//! of a phone number from an accepted region. It:
//! - Records join requests and approves verified, unbanned users
//! - Verifies shared contacts against per-chat region policies
//! - Retroactively approves every pending request after verification
//! - Propagates bans to every managed chat it is bound to
//! - Reconciles chats it is added to with the stored group registry

pub mod bot;
pub mod commands;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod logging;
pub mod messages;
pub mod metrics;
pub mod notify;
pub mod shutdown;

pub use bot::GatekeeperBot;
pub use commands::{Command, CommandError, GroupAction, PolicyAction};
pub use config::BotConfig;
pub use controller::{AdmissionController, Stores};
pub use dispatcher::Dispatcher;
pub use error::AdmissionError;
pub use events::{
    BanReport, ContactOutcome, DeclineOutcome, HoldReason, JoinOutcome, ReconcileOutcome, Stats,
    SweepReport,
};
pub use logging::{init_logging, LogFormat};
pub use metrics::AdmissionMetrics;
pub use notify::Notifier;
pub use shutdown::ShutdownController;
