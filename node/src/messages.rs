//! Plain-text rendering of user and admin messages.

use std::fmt::Write as _;

use gatekeeper_types::{ChatId, ManagedGroup, UserId, UserProfile};
use gatekeeper_verification::{CountryPolicy, RejectReason};

use crate::events::{BanReport, HoldReason, Stats, SweepReport};

pub fn welcome_approved(chat_title: &str) -> String {
    format!("Welcome to {chat_title}! You were approved automatically as a verified member.")
}

pub fn retroactively_approved(chat_title: &str) -> String {
    format!("You have been approved to join {chat_title} now that your number is verified.")
}

pub fn guidance(first_name: &str, chat_title: &str, reason: &HoldReason) -> String {
    match reason {
        HoldReason::Unverified => format!(
            "Hi {first_name}! Your request to join {chat_title} is pending.\n\n\
             To be approved automatically, verify your phone number: send /start \
             and share your contact.\n\n\
             Once verified you are approved without requesting again."
        ),
        HoldReason::RegionNotAccepted { region } => format!(
            "Hi {first_name}! Your request to join {chat_title} is pending.\n\n\
             {chat_title} does not accept numbers issued in {region}. An administrator \
             can review your request."
        ),
        HoldReason::Banned => format!(
            "Your request to join {chat_title} is pending review by an administrator."
        ),
    }
}

pub fn start_prompt(first_name: &str) -> String {
    format!(
        "Hi {first_name}! To join our groups, verify your identity by sharing \
         your phone number with the button below."
    )
}

pub fn already_verified(group_list: &str) -> String {
    format!("You are already verified.\n\n{group_list}")
}

pub fn verified(number: &str, group_list: &str) -> String {
    format!(
        "Verified! Your number {number} is confirmed. You will be approved \
         automatically for every group.\n\n{group_list}"
    )
}

pub fn verification_failed(number: &str, reason: &RejectReason, policy: &CountryPolicy) -> String {
    format!(
        "Verification failed for {number}: {reason}.\n\
         Accepted regions: {policy}. Please try again with an accepted number."
    )
}

pub const NOT_OWN_CONTACT: &str = "Please share your own contact, not someone else's.";

pub const GROUPS_REQUIRE_VERIFICATION: &str =
    "You must be verified to see the list of groups. Send /start to begin.";

pub const PERMISSION_DENIED: &str = "You don't have permission to use this command.";

pub fn help(is_admin: bool) -> String {
    let mut text = String::from(
        "Commands:\n\
         /start - start verification\n\
         /groups - list available groups (verified users)\n\
         /help - show this message",
    );
    if is_admin {
        text.push_str(
            "\n\nAdmin commands:\n\
             /ban <user_id> - ban a user from every managed group\n\
             /unban <user_id> - lift a ban\n\
             /manage_groups - add, remove, list or refresh groups\n\
             /policy - show or change accepted regions\n\
             /decline <user_id> <chat_id> - decline a join request\n\
             /redrive <user_id> - retry failed approvals\n\
             /stats - show statistics",
        );
    }
    text
}

pub const MANAGE_GROUPS_USAGE: &str = "Group management:\n\
    /manage_groups add \"Name\" \"Description\" \"https://t.me/link\"\n\
    /manage_groups remove <group_id>\n\
    /manage_groups list\n\
    /manage_groups refresh";

pub const POLICY_USAGE: &str = "Region policy:\n\
    /policy show\n\
    /policy set <default|chat_id> <CODE> [CODE...]\n\
    /policy clear <chat_id>";

pub fn group_listing(groups: &[ManagedGroup]) -> String {
    if groups.is_empty() {
        return "No groups found.".to_string();
    }
    let mut out = String::from("Managed groups:\n");
    for g in groups {
        let chat = g
            .chat_id
            .map_or_else(|| "not set".to_string(), |c| c.to_string());
        let _ = write!(
            out,
            "\nID: {}\nName: {}\nDescription: {}\nLink: {}\nChat ID: {}\n",
            g.id, g.name, g.description, g.link, chat
        );
    }
    out
}

pub fn stats(stats: &Stats, runtime: &str) -> String {
    format!(
        "Statistics\n\n\
         Verified users: {}\n\
         Banned users: {}\n\
         Groups: {}\n\
         Pending join requests: {}\n\n\
         Since start: {runtime}",
        stats.verified, stats.banned, stats.groups, stats.pending
    )
}

pub fn ban_report(user: UserId, report: &BanReport) -> String {
    let mut out = format!(
        "User {user} is now banned. Removal attempted in {} group(s).",
        report.attempted.len()
    );
    for (chat, error) in &report.failed {
        let _ = write!(out, "\nFailed in {chat}: {error}");
    }
    out
}

pub fn sweep_report(user: UserId, report: &SweepReport) -> String {
    let mut out = format!(
        "Re-drive for {user}: {} approved, {} failed, {} still pending.",
        report.approved.len(),
        report.failed.len(),
        report.held.len()
    );
    for (chat, error) in &report.failed {
        let _ = write!(out, "\nFailed in {chat}: {error}");
    }
    out
}

// ── Admin notifications ────────────────────────────────────────────────

pub fn admin_new_verification(user: &UserProfile, region: &str) -> String {
    format!(
        "New verified user: {} ({}), ID {}, region {region}",
        user.name,
        user.display_handle(),
        user.id
    )
}

pub fn admin_auto_approved(user: &UserProfile, chat_title: &str) -> String {
    format!(
        "Auto-approved {} ({}) to {chat_title}",
        user.name,
        user.display_handle()
    )
}

pub fn admin_retro_approved(user: UserId, chat_title: &str) -> String {
    format!("Auto-approved pending request: user {user} for {chat_title}")
}

pub fn admin_pending(user: &UserProfile, chat_title: &str, reason: &HoldReason) -> String {
    format!(
        "Pending ({reason}): {} ({}) wants to join {chat_title}",
        user.name,
        user.display_handle()
    )
}

pub fn admin_approval_failed(user: UserId, chat: ChatId, error: &dyn std::fmt::Display) -> String {
    format!("Approving user {user} in chat {chat} failed: {error}. Use /redrive {user} to retry.")
}

pub fn admin_member_banned(user: &UserProfile, chat_title: &str) -> String {
    format!(
        "User {} ({}) was banned from {chat_title}",
        user.name,
        user.display_handle()
    )
}

pub fn admin_bot_added(chat_title: &str, chat: ChatId, matched: Option<&ManagedGroup>) -> String {
    match matched {
        Some(group) => format!(
            "Bot added to {chat_title} (ID {chat}). Matched with stored group {} (#{}).",
            group.name, group.id
        ),
        None => format!(
            "Bot added to {chat_title} (ID {chat}). No matching stored group found."
        ),
    }
}

pub fn admin_bind_conflict(chat_title: &str, chat: ChatId, detail: &str) -> String {
    format!("Bot added to {chat_title} (ID {chat}) but the chat could not be bound: {detail}")
}

pub fn admin_bot_removed(chat_title: &str, chat: ChatId) -> String {
    format!("Bot removed from {chat_title} (ID {chat})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_shows_admin_section_only_to_admin() {
        assert!(!help(false).contains("/ban"));
        assert!(help(true).contains("/ban <user_id>"));
    }

    #[test]
    fn guidance_depends_on_reason() {
        let unverified = guidance("Ana", "Devs", &HoldReason::Unverified);
        assert!(unverified.contains("/start"));
        let region = guidance(
            "Ana",
            "Devs",
            &HoldReason::RegionNotAccepted {
                region: "US".into(),
            },
        );
        assert!(region.contains("US"));
        assert!(!region.contains("/start"));
    }
}
