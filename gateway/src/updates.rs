//! Inbound update model (the subset of the Bot API the bot subscribes to).

use serde::Deserialize;

use gatekeeper_types::{ChatId, UserId, UserProfile};

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub chat_join_request: Option<ChatJoinRequest>,
    pub chat_member: Option<ChatMemberUpdated>,
    pub my_chat_member: Option<ChatMemberUpdated>,
}

/// Borrowed view of the payload an update carries.
#[derive(Clone, Copy, Debug)]
pub enum UpdateKind<'a> {
    Message(&'a Message),
    JoinRequest(&'a ChatJoinRequest),
    MemberChanged(&'a ChatMemberUpdated),
    BotMembershipChanged(&'a ChatMemberUpdated),
    Unsupported,
}

impl Update {
    pub fn kind(&self) -> UpdateKind<'_> {
        if let Some(message) = &self.message {
            UpdateKind::Message(message)
        } else if let Some(request) = &self.chat_join_request {
            UpdateKind::JoinRequest(request)
        } else if let Some(changed) = &self.chat_member {
            UpdateKind::MemberChanged(changed)
        } else if let Some(changed) = &self.my_chat_member {
            UpdateKind::BotMembershipChanged(changed)
        } else {
            UpdateKind::Unsupported
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        let profile = UserProfile::new(self.id, self.first_name.clone());
        match &self.username {
            Some(handle) => profile.with_handle(handle.clone()),
            None => profile,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }

    /// Title for display; falls back to the chat id.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub contact: Option<Contact>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub first_name: String,
    /// Present when the contact is a platform user.
    pub user_id: Option<UserId>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: Chat,
    pub from: User,
    pub date: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    /// Who performed the change.
    pub from: User,
    pub date: u64,
    pub old_chat_member: ChatMember,
    pub new_chat_member: ChatMember,
}

impl ChatMemberUpdated {
    pub fn status_changed(&self) -> bool {
        self.old_chat_member.status != self.new_chat_member.status
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatMember {
    pub status: MemberStatus,
    /// The member whose status changed.
    pub user: User,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
    #[serde(other)]
    Unknown,
}

impl MemberStatus {
    /// The bot can act in the chat.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Creator | Self::Administrator | Self::Member)
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Left | Self::Kicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_request_update_is_classified() {
        let raw = r#"{
            "update_id": 10,
            "chat_join_request": {
                "chat": {"id": -1001, "type": "supergroup", "title": "Manila Devs"},
                "from": {"id": 42, "is_bot": false, "first_name": "Ana", "username": "ana"},
                "user_chat_id": 42,
                "date": 1700000000
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        match update.kind() {
            UpdateKind::JoinRequest(req) => {
                assert_eq!(req.chat.id, ChatId::new(-1001));
                assert_eq!(req.from.profile().display_handle(), "@ana");
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn unknown_member_status_is_tolerated() {
        let raw = r#"{
            "update_id": 11,
            "my_chat_member": {
                "chat": {"id": -1002, "type": "group", "title": "G"},
                "from": {"id": 1, "first_name": "Admin"},
                "date": 1,
                "old_chat_member": {"status": "left", "user": {"id": 9, "is_bot": true, "first_name": "bot"}},
                "new_chat_member": {"status": "owner_of_sorts", "user": {"id": 9, "is_bot": true, "first_name": "bot"}}
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let UpdateKind::BotMembershipChanged(changed) = update.kind() else {
            panic!("expected bot membership change");
        };
        assert_eq!(changed.new_chat_member.status, MemberStatus::Unknown);
        assert!(changed.status_changed());
    }

    #[test]
    fn contact_message_parses() {
        let raw = r#"{
            "update_id": 12,
            "message": {
                "message_id": 5,
                "from": {"id": 42, "first_name": "Ana"},
                "chat": {"id": 42, "type": "private", "first_name": "Ana"},
                "contact": {"phone_number": "+639171234567", "first_name": "Ana", "user_id": 42}
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let UpdateKind::Message(message) = update.kind() else {
            panic!("expected message");
        };
        assert!(message.chat.is_private());
        assert_eq!(message.contact.as_ref().unwrap().user_id, Some(UserId::new(42)));
    }

    #[test]
    fn other_update_types_are_unsupported() {
        let update: Update = serde_json::from_str(r#"{"update_id": 1, "poll": {}}"#).unwrap();
        assert!(matches!(update.kind(), UpdateKind::Unsupported));
    }
}
