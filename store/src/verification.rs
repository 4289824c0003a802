//! Verified-user and country-policy storage trait.

use std::collections::BTreeSet;

use crate::StoreError;
use gatekeeper_types::{PolicyScope, Timestamp, UserId, UserProfile, VerifiedUser};

/// Trait for the durable record of verified and banned users, plus the
/// per-scope allowlists of accepted region codes.
///
/// Implementations must make `record_verification`, `ban` and `unban`
/// atomic read-modify-write operations on a single record, so a ban that
/// returns is never undone by a verification racing with it.
pub trait VerificationStore {
    /// Upsert a successful verification. Phone, region, name, handle and
    /// timestamp are overwritten; an existing banned flag is preserved.
    fn record_verification(
        &self,
        profile: &UserProfile,
        phone_number: &str,
        region: &str,
        verified_at: Timestamp,
    ) -> Result<VerifiedUser, StoreError>;

    fn is_verified_and_not_banned(&self, user: UserId) -> Result<bool, StoreError>;

    /// Mark the user banned. Creates a placeholder record for unknown users.
    fn ban(&self, user: UserId) -> Result<(), StoreError>;

    /// Clear the banned flag. Returns whether a record existed.
    fn unban(&self, user: UserId) -> Result<bool, StoreError>;

    fn lookup(&self, user: UserId) -> Result<Option<VerifiedUser>, StoreError>;

    /// Allowlist stored for exactly this scope; `None` when the scope has none.
    fn allowed_codes(&self, scope: PolicyScope) -> Result<Option<BTreeSet<String>>, StoreError>;

    fn set_allowed_codes(
        &self,
        scope: PolicyScope,
        codes: &BTreeSet<String>,
    ) -> Result<(), StoreError>;

    /// Remove a scope's allowlist. Returns whether one existed.
    fn clear_allowed_codes(&self, scope: PolicyScope) -> Result<bool, StoreError>;

    /// Every stored allowlist.
    fn list_policies(&self) -> Result<Vec<(PolicyScope, BTreeSet<String>)>, StoreError>;

    /// Users that are verified and not banned.
    fn verified_count(&self) -> Result<u64, StoreError>;

    fn banned_count(&self) -> Result<u64, StoreError>;
}
