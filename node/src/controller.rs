//! The admission state machine.
//!
//! Per (user, chat) pair: `Unrequested -> Pending -> {Approved, Declined, Error}`,
//! with `Pending` re-entered from any state by a new join request. Requests
//! from users who are not admissible stay `Pending` and are never declined
//! automatically; a later verification approves them retroactively.
//!
//! Gateway failures are matched at the call site: the pair degrades to
//! `Error`, the administrator is told, and processing moves on. Best-effort
//! messages go through [`Notifier`] and cannot affect ledger state.

use std::collections::BTreeSet;
use std::sync::Arc;

use gatekeeper_gateway::{Gateway, GatewayError};
use gatekeeper_groups::{find_match, ChatIdentity, GroupRegistry, MatchConfidence};
use gatekeeper_store::{GroupStore, JoinRequestLedger, StoreError, VerificationStore};
use gatekeeper_types::{
    ChatId, Clock, GroupId, JoinStatus, ManagedGroup, NewGroup, PolicyScope, UserId,
    UserProfile, VerifiedUser,
};
use gatekeeper_verification::{is_known_region, CountryPolicy, PhoneVerifier};

use crate::events::{
    BanReport, ContactOutcome, DeclineOutcome, HoldReason, JoinOutcome, ReconcileOutcome, Stats,
    SweepReport,
};
use crate::messages;
use crate::metrics::{AdmissionMetrics, RECONCILE_UNMATCHED};
use crate::notify::Notifier;
use crate::AdmissionError;

/// The persistent stores the controller reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub verification: Arc<dyn VerificationStore + Send + Sync>,
    pub ledger: Arc<dyn JoinRequestLedger + Send + Sync>,
    pub groups: Arc<dyn GroupStore + Send + Sync>,
}

impl Stores {
    /// All three roles served by one backend.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: VerificationStore + JoinRequestLedger + GroupStore + Send + Sync + 'static,
    {
        Self {
            verification: store.clone(),
            ledger: store.clone(),
            groups: store,
        }
    }
}

enum Admissibility {
    Admissible,
    Held(HoldReason),
}

pub struct AdmissionController {
    stores: Stores,
    registry: Arc<GroupRegistry>,
    gateway: Arc<dyn Gateway>,
    notifier: Notifier,
    verifier: PhoneVerifier,
    metrics: Arc<AdmissionMetrics>,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    pub fn new(
        stores: Stores,
        gateway: Arc<dyn Gateway>,
        verifier: PhoneVerifier,
        clock: Arc<dyn Clock>,
        admin: UserId,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        let registry = Arc::new(GroupRegistry::new(stores.groups.clone()));
        let notifier = Notifier::new(gateway.clone(), admin, metrics.clone());
        Self {
            stores,
            registry,
            gateway,
            notifier,
            verifier,
            metrics,
            clock,
        }
    }

    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn metrics(&self) -> &Arc<AdmissionMetrics> {
        &self.metrics
    }

    pub fn admin(&self) -> UserId {
        self.notifier.admin()
    }

    // ── Join requests ──────────────────────────────────────────────────

    /// A user asked to join `chat`.
    ///
    /// The pair is (re)opened as `Pending` first. Admissible users are
    /// approved; everyone else gets guidance and the request stays open.
    pub async fn on_join_request(
        &self,
        user: &UserProfile,
        chat: ChatId,
        chat_title: &str,
    ) -> Result<JoinOutcome, AdmissionError> {
        self.metrics.join_requests.inc();
        self.stores.ledger.open(user.id, chat, self.clock.now())?;
        tracing::info!(user_id = %user.id, chat_id = %chat, "join request opened");

        let record = self.stores.verification.lookup(user.id)?;
        match self.admissibility(record.as_ref(), chat)? {
            Admissibility::Admissible => match self.approve_pair(user.id, chat).await? {
                Ok(()) => {
                    self.notifier
                        .notify_user(user.id, &messages::welcome_approved(chat_title))
                        .await;
                    self.notifier
                        .notify_admin(&messages::admin_auto_approved(user, chat_title))
                        .await;
                    Ok(JoinOutcome::Approved)
                }
                Err(e) => Ok(JoinOutcome::ApprovalFailed(e)),
            },
            Admissibility::Held(reason) => {
                self.metrics.guidance_sent.inc();
                tracing::info!(user_id = %user.id, chat_id = %chat, %reason, "join request held");
                self.notifier
                    .notify_user(
                        user.id,
                        &messages::guidance(&user.name, chat_title, &reason),
                    )
                    .await;
                self.notifier
                    .notify_admin(&messages::admin_pending(user, chat_title, &reason))
                    .await;
                Ok(JoinOutcome::Held(reason))
            }
        }
    }

    /// Approve on the platform and record the outcome for the pair.
    ///
    /// The outer error is a store failure; the inner one is the gateway's.
    /// A failure never downgrades a pair that another path already approved.
    async fn approve_pair(
        &self,
        user: UserId,
        chat: ChatId,
    ) -> Result<Result<(), GatewayError>, AdmissionError> {
        match self.gateway.approve_join_request(chat, user).await {
            Ok(()) => {
                self.stores
                    .ledger
                    .set_status(user, chat, JoinStatus::Approved)?;
                self.metrics.approvals.inc();
                tracing::info!(user_id = %user, chat_id = %chat, status = "approved", "join request approved");
                Ok(Ok(()))
            }
            Err(e) => {
                let current = self.stores.ledger.get(user, chat)?.map(|r| r.status);
                if current == Some(JoinStatus::Approved) {
                    tracing::info!(user_id = %user, chat_id = %chat, status = "approved", error = %e, "approval failed but pair is already approved");
                    return Ok(Ok(()));
                }
                self.stores.ledger.set_status(user, chat, JoinStatus::Error)?;
                self.metrics.approval_failures.inc();
                tracing::error!(user_id = %user, chat_id = %chat, status = "error", error = %e, kind = e.kind(), "approval failed");
                self.notifier
                    .notify_admin(&messages::admin_approval_failed(user, chat, &e))
                    .await;
                Ok(Err(e))
            }
        }
    }

    fn admissibility(
        &self,
        record: Option<&VerifiedUser>,
        chat: ChatId,
    ) -> Result<Admissibility, AdmissionError> {
        let Some(record) = record else {
            return Ok(Admissibility::Held(HoldReason::Unverified));
        };
        if record.banned {
            return Ok(Admissibility::Held(HoldReason::Banned));
        }
        let (true, Some(region)) = (record.is_verified(), record.region.as_deref()) else {
            return Ok(Admissibility::Held(HoldReason::Unverified));
        };
        if self.effective_policy(chat)?.allows(region) {
            Ok(Admissibility::Admissible)
        } else {
            Ok(Admissibility::Held(HoldReason::RegionNotAccepted {
                region: region.to_string(),
            }))
        }
    }

    // ── Verification ───────────────────────────────────────────────────

    /// A user shared a contact card.
    ///
    /// The number must belong to the sender and be accepted by the default
    /// policy or the policy of any chat the sender is waiting on. Acceptance
    /// records the verification and sweeps the sender's pending requests.
    pub async fn on_contact_shared(
        &self,
        sender: &UserProfile,
        contact_user: Option<UserId>,
        phone_number: &str,
    ) -> Result<ContactOutcome, AdmissionError> {
        if contact_user != Some(sender.id) {
            tracing::info!(user_id = %sender.id, "rejected contact belonging to someone else");
            self.notifier
                .notify_user(sender.id, messages::NOT_OWN_CONTACT)
                .await;
            return Ok(ContactOutcome::NotOwnContact);
        }

        let policy = self.verification_policy(sender.id)?;
        let verdict = self.verifier.verify_international(phone_number, &policy);
        let shown = verdict
            .normalized_number
            .clone()
            .unwrap_or_else(|| phone_number.to_string());

        let (true, Some(region)) = (verdict.accepted, verdict.issuing_code.clone()) else {
            self.metrics.verifications_rejected.inc();
            let reason = verdict
                .reason
                .unwrap_or(gatekeeper_verification::RejectReason::InvalidNumber);
            tracing::info!(user_id = %sender.id, %reason, "verification rejected");
            self.notifier
                .notify_user(
                    sender.id,
                    &messages::verification_failed(&shown, &reason, &policy),
                )
                .await;
            return Ok(ContactOutcome::Rejected { reason, policy });
        };

        let record = self.stores.verification.record_verification(
            sender,
            &shown,
            &region,
            self.clock.now(),
        )?;
        self.metrics.verifications_accepted.inc();
        tracing::info!(user_id = %sender.id, region = %region, "user verified");

        self.notifier
            .notify_user(
                sender.id,
                &messages::verified(&shown, &self.registry.format_for_display()),
            )
            .await;
        self.notifier
            .notify_admin(&messages::admin_new_verification(sender, &region))
            .await;

        let sweep = self.admission_sweep(sender.id).await?;
        Ok(ContactOutcome::Verified { record, sweep })
    }

    /// Policy a shared number is checked against: the default scope plus the
    /// policy in force for every chat the user has a pending request in.
    fn verification_policy(&self, user: UserId) -> Result<CountryPolicy, AdmissionError> {
        let mut policy = self.scope_policy(PolicyScope::Default)?.unwrap_or_default();
        for chat in self.stores.ledger.pending_for_user(user)? {
            policy = policy.union(&self.effective_policy(chat)?);
        }
        Ok(policy)
    }

    /// Attempt every pending request of `user`.
    ///
    /// Chats are processed independently to completion: a gateway or store
    /// failure for one chat is recorded in the report and the sweep continues.
    /// The user's record is read again before each chat.
    pub async fn admission_sweep(&self, user: UserId) -> Result<SweepReport, AdmissionError> {
        let pending = self.stores.ledger.pending_for_user(user)?;
        let mut report = SweepReport::default();

        for chat in pending {
            // Re-read per chat: a ban may land while an earlier approval is in flight.
            let admissibility = match self
                .stores
                .verification
                .lookup(user)
                .map_err(AdmissionError::from)
                .and_then(|record| self.admissibility(record.as_ref(), chat))
            {
                Ok(a) => a,
                Err(e) => {
                    tracing::error!(user_id = %user, chat_id = %chat, error = %e, "sweep could not read record or policy");
                    report.store_errors.push((chat, e.to_string()));
                    continue;
                }
            };
            if let Admissibility::Held(reason) = admissibility {
                report.held.push((chat, reason));
                continue;
            }

            match self.approve_pair(user, chat).await {
                Ok(Ok(())) => {
                    let title = self.chat_title(chat).await;
                    self.notifier
                        .notify_user(user, &messages::retroactively_approved(&title))
                        .await;
                    self.notifier
                        .notify_admin(&messages::admin_retro_approved(user, &title))
                        .await;
                    report.approved.push(chat);
                }
                Ok(Err(e)) => report.failed.push((chat, e)),
                Err(e) => {
                    tracing::error!(user_id = %user, chat_id = %chat, error = %e, "sweep could not update ledger");
                    report.store_errors.push((chat, e.to_string()));
                }
            }
        }

        tracing::info!(
            user_id = %user,
            approved = report.approved.len(),
            failed = report.failed.len(),
            held = report.held.len(),
            "admission sweep finished"
        );
        Ok(report)
    }

    /// Display title for a chat: managed group name, else platform metadata.
    async fn chat_title(&self, chat: ChatId) -> String {
        if let Some(group) = self.registry.find_by_chat(chat) {
            return group.name;
        }
        match self.gateway.get_chat_metadata(chat).await {
            Ok(meta) => meta.title,
            Err(e) => {
                tracing::debug!(chat_id = %chat, error = %e, "chat metadata unavailable");
                chat.to_string()
            }
        }
    }

    // ── Moderation ─────────────────────────────────────────────────────

    /// Ban a user everywhere.
    ///
    /// The stored ban is committed first and unconditionally; removal is then
    /// attempted in every bound managed chat, each independently.
    pub async fn ban(&self, user: UserId) -> Result<BanReport, AdmissionError> {
        self.stores.verification.ban(user)?;
        self.metrics.bans.inc();
        tracing::info!(user_id = %user, "user banned");

        let mut report = BanReport::default();
        for (group, chat) in self.registry.bound_chats() {
            report.attempted.push(chat);
            match self.gateway.ban_member(chat, user).await {
                Ok(()) => {
                    tracing::info!(user_id = %user, chat_id = %chat, group_id = %group.id, "removed banned user");
                }
                Err(e) => {
                    self.metrics.ban_failures.inc();
                    tracing::error!(user_id = %user, chat_id = %chat, group_id = %group.id, error = %e, "failed to remove banned user");
                    report.failed.push((chat, e));
                }
            }
        }
        Ok(report)
    }

    /// Lift a ban. Returns whether the user had a record.
    pub fn unban(&self, user: UserId) -> Result<bool, AdmissionError> {
        let existed = self.stores.verification.unban(user)?;
        tracing::info!(user_id = %user, existed, "user unbanned");
        Ok(existed)
    }

    /// A member was banned in a chat by someone else; mirror it in the store.
    pub async fn on_member_banned(
        &self,
        member: &UserProfile,
        chat: ChatId,
        chat_title: &str,
    ) -> Result<(), AdmissionError> {
        self.stores.verification.ban(member.id)?;
        self.metrics.bans.inc();
        tracing::info!(user_id = %member.id, chat_id = %chat, "member banned in chat");
        self.notifier
            .notify_admin(&messages::admin_member_banned(member, chat_title))
            .await;
        Ok(())
    }

    /// Administrator-initiated decline of a pending request.
    pub async fn decline(
        &self,
        user: UserId,
        chat: ChatId,
    ) -> Result<DeclineOutcome, AdmissionError> {
        if self.stores.ledger.get(user, chat)?.is_none() {
            return Err(AdmissionError::Validation(format!(
                "no join request from {user} in {chat}"
            )));
        }
        match self.gateway.decline_join_request(chat, user).await {
            Ok(()) => {
                self.stores
                    .ledger
                    .set_status(user, chat, JoinStatus::Declined)?;
                self.metrics.declines.inc();
                tracing::info!(user_id = %user, chat_id = %chat, status = "declined", "join request declined");
                Ok(DeclineOutcome::Declined)
            }
            Err(e) => {
                self.stores.ledger.set_status(user, chat, JoinStatus::Error)?;
                tracing::error!(user_id = %user, chat_id = %chat, error = %e, "decline failed");
                Ok(DeclineOutcome::Failed(e))
            }
        }
    }

    /// Move the user's `Error` requests back to `Pending` and sweep again.
    pub async fn redrive(&self, user: UserId) -> Result<SweepReport, AdmissionError> {
        let mut reset = 0usize;
        for request in self.stores.ledger.requests_for_user(user)? {
            if request.status == JoinStatus::Error {
                self.stores
                    .ledger
                    .set_status(user, request.chat_id, JoinStatus::Pending)?;
                reset += 1;
            }
        }
        tracing::info!(user_id = %user, reset, "re-driving failed requests");
        self.admission_sweep(user).await
    }

    // ── Reconciliation ─────────────────────────────────────────────────

    /// The bot was added to a chat. Bind it to its managed group if one matches.
    pub async fn on_bot_added(
        &self,
        chat: ChatId,
        title: &str,
        public_handle: Option<&str>,
    ) -> Result<ReconcileOutcome, AdmissionError> {
        let exported_link = match self.gateway.export_invite_link(chat).await {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::warn!(chat_id = %chat, error = %e, "could not export invite link");
                None
            }
        };
        let identity = ChatIdentity {
            chat_id: chat,
            title: title.to_string(),
            public_handle: public_handle.map(str::to_string),
            exported_link,
        };

        let snapshot = self.registry.snapshot();
        let Some((group, method)) = find_match(&snapshot, &identity) else {
            self.metrics.record_reconciliation(RECONCILE_UNMATCHED);
            tracing::warn!(chat_id = %chat, title, "joined chat matches no managed group");
            self.notifier
                .notify_admin(&messages::admin_bot_added(title, chat, None))
                .await;
            return Ok(ReconcileOutcome::Unmatched);
        };

        if method.confidence() == MatchConfidence::Low {
            tracing::warn!(chat_id = %chat, group_id = %group.id, method = %method, confidence = "low", "matched group by title");
        }

        if let Some(bound) = group.chat_id.filter(|bound| *bound != chat) {
            let detail = format!("group {} is already bound to chat {bound}", group.id);
            return Ok(self.report_conflict(group, chat, title, detail).await);
        }

        let bound = match self.stores.groups.bind_chat_id(group.id, chat) {
            Ok(bound) => bound,
            Err(StoreError::Duplicate(detail)) => {
                return Ok(self.report_conflict(group, chat, title, detail).await);
            }
            Err(e) => return Err(e.into()),
        };
        self.refresh_registry()?;
        self.metrics.record_reconciliation(method.as_str());
        tracing::info!(chat_id = %chat, group_id = %bound.id, method = %method, "bound chat to managed group");
        self.notifier
            .notify_admin(&messages::admin_bot_added(title, chat, Some(&bound)))
            .await;
        Ok(ReconcileOutcome::Bound {
            group: bound,
            method,
        })
    }

    async fn report_conflict(
        &self,
        group: ManagedGroup,
        chat: ChatId,
        title: &str,
        detail: String,
    ) -> ReconcileOutcome {
        tracing::warn!(chat_id = %chat, group_id = %group.id, %detail, "reconciliation conflict");
        self.notifier
            .notify_admin(&messages::admin_bind_conflict(title, chat, &detail))
            .await;
        ReconcileOutcome::Conflict { group, detail }
    }

    /// The bot left or was removed from a chat. Bindings are kept.
    pub async fn on_bot_removed(&self, chat: ChatId, title: &str) {
        tracing::info!(chat_id = %chat, "bot removed from chat");
        self.notifier
            .notify_admin(&messages::admin_bot_removed(title, chat))
            .await;
    }

    // ── Group administration ───────────────────────────────────────────

    pub fn add_group(
        &self,
        name: &str,
        description: &str,
        link: &str,
    ) -> Result<ManagedGroup, AdmissionError> {
        let group = self.stores.groups.add_group(NewGroup::new(name, description, link)?)?;
        self.refresh_registry()?;
        tracing::info!(group_id = %group.id, link = %group.link, "managed group added");
        Ok(group)
    }

    pub fn remove_group(&self, id: GroupId) -> Result<Option<ManagedGroup>, AdmissionError> {
        let removed = self.stores.groups.remove_group(id)?;
        if removed.is_some() {
            self.refresh_registry()?;
            tracing::info!(group_id = %id, "managed group removed");
        }
        Ok(removed)
    }

    /// Groups straight from the store, bypassing the cache.
    pub fn list_groups(&self) -> Result<Vec<ManagedGroup>, AdmissionError> {
        Ok(self.stores.groups.list_groups()?)
    }

    pub fn refresh_registry(&self) -> Result<usize, AdmissionError> {
        let count = self.registry.refresh(self.clock.now())?;
        self.metrics.registry_size.set(count as i64);
        Ok(count)
    }

    /// Reload the registry when it is older than `max_age_secs`.
    pub fn refresh_registry_if_stale(&self, max_age_secs: u64) -> Result<bool, AdmissionError> {
        if !self.registry.is_stale(self.clock.now(), max_age_secs) {
            return Ok(false);
        }
        self.refresh_registry()?;
        Ok(true)
    }

    // ── Country policy ─────────────────────────────────────────────────

    fn scope_policy(&self, scope: PolicyScope) -> Result<Option<CountryPolicy>, AdmissionError> {
        Ok(self
            .stores
            .verification
            .allowed_codes(scope)?
            .map(CountryPolicy::from))
    }

    /// The chat's own policy, falling back to the default scope.
    pub fn effective_policy(&self, chat: ChatId) -> Result<CountryPolicy, AdmissionError> {
        if let Some(policy) = self.scope_policy(PolicyScope::Chat(chat))? {
            return Ok(policy);
        }
        Ok(self.scope_policy(PolicyScope::Default)?.unwrap_or_default())
    }

    pub fn set_policy<I, S>(&self, scope: PolicyScope, codes: I) -> Result<CountryPolicy, AdmissionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let policy = CountryPolicy::new(codes);
        if policy.is_empty() {
            return Err(AdmissionError::Validation(
                "a policy needs at least one region code".into(),
            ));
        }
        if let Some(unknown) = policy.codes().iter().find(|c| !is_known_region(c)) {
            return Err(AdmissionError::Validation(format!(
                "unknown region code: {unknown}"
            )));
        }
        self.stores
            .verification
            .set_allowed_codes(scope, policy.codes())?;
        tracing::info!(scope = %scope, codes = %policy, "region policy set");
        Ok(policy)
    }

    /// Remove a chat's own policy so the default applies again.
    pub fn clear_policy(&self, scope: PolicyScope) -> Result<bool, AdmissionError> {
        if scope == PolicyScope::Default {
            return Err(AdmissionError::Validation(
                "the default policy can be replaced but not cleared".into(),
            ));
        }
        let existed = self.stores.verification.clear_allowed_codes(scope)?;
        tracing::info!(scope = %scope, existed, "region policy cleared");
        Ok(existed)
    }

    pub fn policies(&self) -> Result<Vec<(PolicyScope, CountryPolicy)>, AdmissionError> {
        Ok(self
            .stores
            .verification
            .list_policies()?
            .into_iter()
            .map(|(scope, codes)| (scope, CountryPolicy::from(codes)))
            .collect())
    }

    /// Store `codes` as the default policy unless one is already set.
    pub fn seed_default_policy(&self, codes: &[String]) -> Result<bool, AdmissionError> {
        if self.scope_policy(PolicyScope::Default)?.is_some() {
            return Ok(false);
        }
        self.set_policy(PolicyScope::Default, codes)?;
        Ok(true)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn is_verified(&self, user: UserId) -> Result<bool, AdmissionError> {
        Ok(self.stores.verification.is_verified_and_not_banned(user)?)
    }

    pub fn stats(&self) -> Result<Stats, AdmissionError> {
        Ok(Stats {
            verified: self.stores.verification.verified_count()?,
            banned: self.stores.verification.banned_count()?,
            groups: self.stores.groups.group_count()?,
            pending: self.stores.ledger.pending_count()?,
        })
    }

    pub fn policy_codes(&self, scope: PolicyScope) -> Result<Option<BTreeSet<String>>, AdmissionError> {
        Ok(self.stores.verification.allowed_codes(scope)?)
    }
}
