//! Nullable gateway: records platform calls instead of making them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use gatekeeper_gateway::{ChatMetadata, Gateway, GatewayError};
use gatekeeper_types::{ChatId, UserId};

/// One call made against the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    Approve { chat: ChatId, user: UserId },
    Decline { chat: ChatId, user: UserId },
    DirectMessage { user: UserId, text: String },
    PromptContact { user: UserId, text: String },
    Ban { chat: ChatId, user: UserId },
    ExportInviteLink { chat: ChatId },
    GetChatMetadata { chat: ChatId },
}

/// Side effect run while an approval is in flight.
type ApproveHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct State {
    approve_hooks: HashMap<ChatId, ApproveHook>,
    calls: Vec<GatewayCall>,
    approve_failures: HashMap<ChatId, GatewayError>,
    decline_failures: HashMap<ChatId, GatewayError>,
    ban_failures: HashMap<ChatId, GatewayError>,
    message_failures: HashMap<UserId, GatewayError>,
    chats: HashMap<ChatId, ChatMetadata>,
    invite_links: HashMap<ChatId, String>,
}

/// A scripted [`Gateway`].
///
/// Every call is recorded, including failed ones. Failures are injected per
/// chat (approve, decline, ban) or per user (direct messages and prompts).
#[derive(Default)]
pub struct NullGateway {
    state: Mutex<State>,
}

impl NullGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_approvals_in(&self, chat: ChatId, error: GatewayError) {
        self.lock().approve_failures.insert(chat, error);
    }

    /// Run `hook` during every approval in `chat`, before the call returns.
    /// Tests use it to change stored state while the controller awaits.
    pub fn on_approve(&self, chat: ChatId, hook: impl Fn() + Send + Sync + 'static) {
        self.lock().approve_hooks.insert(chat, Arc::new(hook));
    }

    pub fn fail_declines_in(&self, chat: ChatId, error: GatewayError) {
        self.lock().decline_failures.insert(chat, error);
    }

    pub fn fail_bans_in(&self, chat: ChatId, error: GatewayError) {
        self.lock().ban_failures.insert(chat, error);
    }

    pub fn fail_messages_to(&self, user: UserId, error: GatewayError) {
        self.lock().message_failures.insert(user, error);
    }

    /// Remove every injected failure and approval hook.
    pub fn heal(&self) {
        let mut state = self.lock();
        state.approve_failures.clear();
        state.decline_failures.clear();
        state.ban_failures.clear();
        state.message_failures.clear();
        state.approve_hooks.clear();
    }

    /// Describe a chat. Chats without metadata answer `NotFound`.
    pub fn add_chat(&self, chat: ChatId, title: &str, public_handle: Option<&str>) {
        self.lock().chats.insert(
            chat,
            ChatMetadata {
                title: title.to_string(),
                public_handle: public_handle.map(str::to_string),
            },
        );
    }

    /// Link returned by `export_invite_link`. Chats without one answer `Forbidden`.
    pub fn set_invite_link(&self, chat: ChatId, link: &str) {
        self.lock().invite_links.insert(chat, link.to_string());
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn approvals(&self) -> Vec<(ChatId, UserId)> {
        self.filter_calls(|call| match call {
            GatewayCall::Approve { chat, user } => Some((*chat, *user)),
            _ => None,
        })
    }

    pub fn declines(&self) -> Vec<(ChatId, UserId)> {
        self.filter_calls(|call| match call {
            GatewayCall::Decline { chat, user } => Some((*chat, *user)),
            _ => None,
        })
    }

    pub fn bans(&self) -> Vec<(ChatId, UserId)> {
        self.filter_calls(|call| match call {
            GatewayCall::Ban { chat, user } => Some((*chat, *user)),
            _ => None,
        })
    }

    /// Text of every direct message and contact prompt sent to `user`.
    pub fn messages_to(&self, user: UserId) -> Vec<String> {
        self.filter_calls(|call| match call {
            GatewayCall::DirectMessage { user: to, text }
            | GatewayCall::PromptContact { user: to, text }
                if *to == user =>
            {
                Some(text.clone())
            }
            _ => None,
        })
    }

    pub fn prompts_to(&self, user: UserId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::PromptContact { user: to, .. } if *to == user))
            .count()
    }

    fn filter_calls<T>(&self, f: impl FnMut(&GatewayCall) -> Option<T>) -> Vec<T> {
        self.lock().calls.iter().filter_map(f).collect()
    }

    fn record(&self, call: GatewayCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl Gateway for NullGateway {
    async fn approve_join_request(&self, chat: ChatId, user: UserId) -> Result<(), GatewayError> {
        let (hook, result) = {
            let mut state = self.lock();
            state.calls.push(GatewayCall::Approve { chat, user });
            (
                state.approve_hooks.get(&chat).cloned(),
                state.approve_failures.get(&chat).cloned().map_or(Ok(()), Err),
            )
        };
        if let Some(hook) = hook {
            hook();
        }
        result
    }

    async fn decline_join_request(&self, chat: ChatId, user: UserId) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Decline { chat, user });
        state.decline_failures.get(&chat).cloned().map_or(Ok(()), Err)
    }

    async fn send_direct_message(&self, user: UserId, text: &str) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::DirectMessage {
            user,
            text: text.to_string(),
        });
        state.message_failures.get(&user).cloned().map_or(Ok(()), Err)
    }

    async fn prompt_contact(&self, user: UserId, text: &str) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::PromptContact {
            user,
            text: text.to_string(),
        });
        state.message_failures.get(&user).cloned().map_or(Ok(()), Err)
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Ban { chat, user });
        state.ban_failures.get(&chat).cloned().map_or(Ok(()), Err)
    }

    async fn export_invite_link(&self, chat: ChatId) -> Result<String, GatewayError> {
        self.record(GatewayCall::ExportInviteLink { chat });
        self.lock()
            .invite_links
            .get(&chat)
            .cloned()
            .ok_or_else(|| GatewayError::Forbidden("not enough rights to export link".into()))
    }

    async fn get_chat_metadata(&self, chat: ChatId) -> Result<ChatMetadata, GatewayError> {
        self.record(GatewayCall::GetChatMetadata { chat });
        self.lock()
            .chats
            .get(&chat)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("chat {chat}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_calls_are_still_recorded() {
        let gateway = NullGateway::new();
        let chat = ChatId::new(-100);
        let user = UserId::new(7);
        gateway.fail_approvals_in(chat, GatewayError::Forbidden("no rights".into()));

        assert!(gateway.approve_join_request(chat, user).await.is_err());
        assert!(gateway
            .approve_join_request(ChatId::new(-200), user)
            .await
            .is_ok());
        assert_eq!(gateway.approvals(), [(chat, user), (ChatId::new(-200), user)]);

        gateway.heal();
        assert!(gateway.approve_join_request(chat, user).await.is_ok());
    }

    #[tokio::test]
    async fn approve_hook_runs_once_per_call() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let gateway = NullGateway::new();
        let chat = ChatId::new(-100);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        gateway.on_approve(chat, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        gateway.approve_join_request(chat, UserId::new(1)).await.unwrap();
        gateway.approve_join_request(ChatId::new(-200), UserId::new(1)).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        gateway.heal();
        gateway.approve_join_request(chat, UserId::new(1)).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn messages_are_collected_per_user() {
        let gateway = NullGateway::new();
        let user = UserId::new(7);
        gateway.send_direct_message(user, "hello").await.unwrap();
        gateway.prompt_contact(user, "share").await.unwrap();
        gateway
            .send_direct_message(UserId::new(8), "other")
            .await
            .unwrap();

        assert_eq!(gateway.messages_to(user), ["hello", "share"]);
        assert_eq!(gateway.prompts_to(user), 1);
    }

    #[tokio::test]
    async fn unknown_chats_have_no_link_or_metadata() {
        let gateway = NullGateway::new();
        let chat = ChatId::new(-1);
        assert!(gateway.export_invite_link(chat).await.is_err());
        gateway.add_chat(chat, "Title", Some("handle"));
        gateway.set_invite_link(chat, "https://t.me/+x");
        assert_eq!(gateway.export_invite_link(chat).await.unwrap(), "https://t.me/+x");
        assert_eq!(
            gateway.get_chat_metadata(chat).await.unwrap().public_handle.as_deref(),
            Some("handle")
        );
    }
}
