//! Routes inbound updates to the admission controller.
//!
//! Each update is handled on its own task so a slow platform call for one
//! user never delays another. The poll loop and the registry refresh task
//! both stop on the shutdown broadcast.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};

use gatekeeper_gateway::{
    ChatJoinRequest, ChatMemberUpdated, LongPoller, MemberStatus, Message, Update, UpdateKind,
    UpdateSource,
};
use gatekeeper_types::UserProfile;

use crate::commands::{Command, CommandError, GroupAction, PolicyAction};
use crate::controller::AdmissionController;
use crate::events::DeclineOutcome;
use crate::messages;
use crate::AdmissionError;

pub struct Dispatcher {
    controller: Arc<AdmissionController>,
    registry_refresh_secs: u64,
    started: Instant,
}

impl Dispatcher {
    pub fn new(controller: Arc<AdmissionController>, registry_refresh_secs: u64) -> Self {
        Self {
            controller,
            registry_refresh_secs: registry_refresh_secs.max(1),
            started: Instant::now(),
        }
    }

    pub fn controller(&self) -> &Arc<AdmissionController> {
        &self.controller
    }

    /// Poll `source` until shutdown, then wait for in-flight handlers.
    pub async fn run<S: UpdateSource>(
        self: Arc<Self>,
        mut source: S,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let refresh_handle = self.spawn_registry_refresh(shutdown.resubscribe());
        let mut tasks = JoinSet::new();
        tracing::info!("dispatcher started");

        loop {
            let batch = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("dispatcher shutting down");
                    break;
                }
                batch = source.next_batch() => batch,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        let this = Arc::clone(&self);
                        tasks.spawn(async move { this.handle_update(update).await });
                    }
                }
                Err(e) => {
                    let delay = LongPoller::backoff_for(&e);
                    tracing::warn!(error = %e, kind = e.kind(), transient = e.is_transient(), delay_ms = delay.as_millis() as u64, "polling failed");
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }

            while let Some(joined) = tasks.try_join_next() {
                reap(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            reap(joined);
        }
        refresh_handle.abort();
        tracing::info!("dispatcher stopped");
    }

    fn spawn_registry_refresh(
        &self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        let max_age = self.registry_refresh_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(max_age));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = controller.refresh_registry_if_stale(max_age) {
                            tracing::warn!(error = %e, "registry refresh failed");
                        }
                    }
                }
            }
        })
    }

    /// Handle one update to completion. Errors are logged, never propagated.
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        let result = match update.kind() {
            UpdateKind::Message(message) => self.on_message(message).await,
            UpdateKind::JoinRequest(request) => self.on_join_request(request).await,
            UpdateKind::MemberChanged(changed) => self.on_member_changed(changed).await,
            UpdateKind::BotMembershipChanged(changed) => self.on_bot_membership(changed).await,
            UpdateKind::Unsupported => {
                tracing::debug!(update_id, "ignoring unsupported update");
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::error!(update_id, error = %e, "update handling failed");
        }
    }

    async fn on_join_request(&self, request: &ChatJoinRequest) -> Result<(), AdmissionError> {
        self.controller
            .on_join_request(
                &request.from.profile(),
                request.chat.id,
                &request.chat.display_title(),
            )
            .await?;
        Ok(())
    }

    async fn on_member_changed(&self, changed: &ChatMemberUpdated) -> Result<(), AdmissionError> {
        let member = &changed.new_chat_member;
        if !changed.status_changed() || member.status != MemberStatus::Kicked || member.user.is_bot
        {
            return Ok(());
        }
        self.controller
            .on_member_banned(
                &member.user.profile(),
                changed.chat.id,
                &changed.chat.display_title(),
            )
            .await
    }

    async fn on_bot_membership(&self, changed: &ChatMemberUpdated) -> Result<(), AdmissionError> {
        if !changed.status_changed() {
            return Ok(());
        }
        let old = changed.old_chat_member.status;
        let new = changed.new_chat_member.status;
        let chat = &changed.chat;

        // Promotion to administrator is retried since exporting a link needs it.
        if new.is_present() && (!old.is_present() || new == MemberStatus::Administrator) {
            self.controller
                .on_bot_added(chat.id, &chat.display_title(), chat.username.as_deref())
                .await?;
        } else if new.is_gone() {
            self.controller
                .on_bot_removed(chat.id, &chat.display_title())
                .await;
        }
        Ok(())
    }

    async fn on_message(&self, message: &Message) -> Result<(), AdmissionError> {
        let Some(from) = &message.from else {
            return Ok(());
        };
        if !message.chat.is_private() || from.is_bot {
            return Ok(());
        }
        let sender = from.profile();

        if let Some(contact) = &message.contact {
            self.controller
                .on_contact_shared(&sender, contact.user_id, &contact.phone_number)
                .await?;
            return Ok(());
        }

        let Some(parsed) = message.text.as_deref().and_then(Command::parse) else {
            return Ok(());
        };
        let notifier = self.controller.notifier();
        let command = match parsed {
            Ok(command) => command,
            Err(CommandError::Usage(usage)) => {
                notifier.notify_user(sender.id, usage).await;
                return Ok(());
            }
            Err(e) => {
                notifier.notify_user(sender.id, &e.to_string()).await;
                return Ok(());
            }
        };

        if command.is_admin_only() && sender.id != self.controller.admin() {
            tracing::warn!(user_id = %sender.id, ?command, "admin command refused");
            notifier
                .notify_user(sender.id, messages::PERMISSION_DENIED)
                .await;
            return Ok(());
        }

        match self.execute(&sender, command).await {
            Ok(Some(reply)) => notifier.notify_user(sender.id, &reply).await,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(user_id = %sender.id, error = %e, "command failed");
                notifier
                    .notify_user(sender.id, &format!("Error: {e}"))
                    .await;
            }
        }
        Ok(())
    }

    /// Run a command. Returns the reply to send, if any.
    async fn execute(
        &self,
        sender: &UserProfile,
        command: Command,
    ) -> Result<Option<String>, AdmissionError> {
        let ctl = &self.controller;
        let reply = match command {
            Command::Start => {
                if ctl.is_verified(sender.id)? {
                    messages::already_verified(&ctl.registry().format_for_display())
                } else {
                    ctl.notifier()
                        .prompt_contact(sender.id, &messages::start_prompt(&sender.name))
                        .await;
                    return Ok(None);
                }
            }
            Command::Help => messages::help(sender.id == ctl.admin()),
            Command::Groups => {
                if ctl.is_verified(sender.id)? {
                    ctl.registry().format_for_display()
                } else {
                    messages::GROUPS_REQUIRE_VERIFICATION.to_string()
                }
            }
            Command::Stats => {
                let runtime = format!(
                    "{} ({})",
                    format_uptime(self.started.elapsed()),
                    ctl.metrics().summary()
                );
                messages::stats(&ctl.stats()?, &runtime)
            }
            Command::Ban(user) => messages::ban_report(user, &ctl.ban(user).await?),
            Command::Unban(user) => {
                if ctl.unban(user)? {
                    format!("User {user} has been unbanned.")
                } else {
                    format!("User {user} has no record; nothing to unban.")
                }
            }
            Command::Decline { user, chat } => match ctl.decline(user, chat).await? {
                DeclineOutcome::Declined => format!("Declined user {user} in chat {chat}."),
                DeclineOutcome::Failed(e) => {
                    format!("Declining user {user} in chat {chat} failed: {e}")
                }
            },
            Command::Redrive(user) => messages::sweep_report(user, &ctl.redrive(user).await?),
            Command::ManageGroups(action) => self.manage_groups(action)?,
            Command::Policy(action) => self.policy(action)?,
            Command::Unknown(name) => {
                format!("Unknown command /{name}. Send /help for the list.")
            }
        };
        Ok(Some(reply))
    }

    fn manage_groups(&self, action: GroupAction) -> Result<String, AdmissionError> {
        let ctl = &self.controller;
        Ok(match action {
            GroupAction::Add {
                name,
                description,
                link,
            } => {
                let group = ctl.add_group(&name, &description, &link)?;
                format!("Group added with ID {}.", group.id)
            }
            GroupAction::Remove(id) => match ctl.remove_group(id)? {
                Some(group) => format!("Group {} ({}) removed.", group.id, group.name),
                None => format!("Group {id} not found."),
            },
            GroupAction::List => messages::group_listing(&ctl.list_groups()?),
            GroupAction::Refresh => {
                format!("Registry refreshed: {} group(s).", ctl.refresh_registry()?)
            }
        })
    }

    fn policy(&self, action: PolicyAction) -> Result<String, AdmissionError> {
        let ctl = &self.controller;
        Ok(match action {
            PolicyAction::Show => {
                let policies = ctl.policies()?;
                if policies.is_empty() {
                    "No region policies set.".to_string()
                } else {
                    policies
                        .iter()
                        .map(|(scope, policy)| format!("{scope}: {policy}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            PolicyAction::Set { scope, codes } => {
                let policy = ctl.set_policy(scope, &codes)?;
                format!("Policy for {scope} set to {policy}.")
            }
            PolicyAction::Clear(scope) => {
                if ctl.clear_policy(scope)? {
                    format!("Policy for {scope} cleared; the default applies.")
                } else {
                    format!("{scope} had no policy of its own.")
                }
            }
        })
    }
}

fn reap(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "update handler panicked");
        }
    }
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
