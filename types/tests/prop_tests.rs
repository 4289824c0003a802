use proptest::prelude::*;

use gatekeeper_types::{ChatId, InviteLink, UserId};

proptest! {
    /// Any handle-shaped path under t.me parses and reports itself as the handle.
    #[test]
    fn public_handle_is_first_segment(handle in "[A-Za-z][A-Za-z0-9_]{3,31}", query in "[a-z0-9=]{0,8}") {
        let raw = if query.is_empty() {
            format!("https://t.me/{handle}")
        } else {
            format!("https://t.me/{handle}?{query}")
        };
        let link = InviteLink::parse(&raw).unwrap();
        prop_assert_eq!(link.public_handle(), Some(handle.as_str()));
    }

    /// `+`-prefixed invite tokens never expose a handle.
    #[test]
    fn plus_tokens_are_private(token in "[A-Za-z0-9_-]{1,24}") {
        let link = InviteLink::parse(&format!("https://t.me/+{token}")).unwrap();
        prop_assert!(link.is_private());
        prop_assert_eq!(link.public_handle(), None);
    }

    /// Links outside the t.me namespace are rejected.
    #[test]
    fn foreign_hosts_rejected(host in "[a-z]{2,10}\\.(com|org|net)", path in "[a-z]{1,10}") {
        let raw = format!("https://{host}/{path}");
        prop_assert!(InviteLink::parse(&raw).is_err());
    }

    /// Every positive decimal id parses; its display form parses back to it.
    #[test]
    fn positive_user_ids_parse(raw in 1i64..i64::MAX) {
        let id: UserId = raw.to_string().parse().unwrap();
        prop_assert_eq!(id.get(), raw);
        prop_assert_eq!(id.to_string().parse::<UserId>().unwrap(), id);
    }

    /// Negative supergroup ids parse as chat ids but never as user ids.
    #[test]
    fn negative_ids_are_chats_only(raw in i64::MIN..0i64) {
        prop_assert!(raw.to_string().parse::<UserId>().is_err());
        prop_assert_eq!(raw.to_string().parse::<ChatId>().unwrap(), ChatId::new(raw));
    }
}
