//! Outcomes reported by the admission controller.

use std::fmt;

use gatekeeper_gateway::GatewayError;
use gatekeeper_groups::MatchMethod;
use gatekeeper_types::{ChatId, ManagedGroup, VerifiedUser};
use gatekeeper_verification::{CountryPolicy, RejectReason};

/// Why a request was left pending instead of approved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HoldReason {
    Unverified,
    Banned,
    /// Verified, but the chat's policy does not accept the user's region.
    RegionNotAccepted { region: String },
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unverified => f.write_str("awaiting verification"),
            Self::Banned => f.write_str("user is banned"),
            Self::RegionNotAccepted { region } => write!(f, "region {region} not accepted"),
        }
    }
}

/// Result of handling a join request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Approved,
    /// The platform refused the approval; the pair is now `Error`.
    ApprovalFailed(GatewayError),
    /// The request stays `Pending`; it is never declined automatically.
    Held(HoldReason),
}

/// Per-chat results of an admission sweep. Each chat is decided on its own.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub approved: Vec<ChatId>,
    pub failed: Vec<(ChatId, GatewayError)>,
    /// Still pending because the user is not admissible there.
    pub held: Vec<(ChatId, HoldReason)>,
    /// Chats whose ledger could not be read or written.
    pub store_errors: Vec<(ChatId, String)>,
}

impl SweepReport {
    pub fn attempted(&self) -> usize {
        self.approved.len() + self.failed.len()
    }
}

/// Result of a contact share.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContactOutcome {
    Verified {
        record: VerifiedUser,
        sweep: SweepReport,
    },
    Rejected {
        reason: RejectReason,
        policy: CountryPolicy,
    },
    /// The shared contact belongs to someone else.
    NotOwnContact,
}

/// Result of a ban. The stored ban is committed before any chat is touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BanReport {
    /// Every chat a removal was attempted in, successful or not.
    pub attempted: Vec<ChatId>,
    pub failed: Vec<(ChatId, GatewayError)>,
}

/// Result of the bot being added to a chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Bound {
        group: ManagedGroup,
        method: MatchMethod,
    },
    /// The best match is already bound to another chat, or the chat to another group.
    Conflict { group: ManagedGroup, detail: String },
    Unmatched,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclineOutcome {
    Declined,
    Failed(GatewayError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub verified: u64,
    pub banned: u64,
    pub groups: u64,
    pub pending: u64,
}
