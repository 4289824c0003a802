//! End-to-end admission flows over real LMDB storage.
//!
//! The controller is wired exactly as the bot wires it, except the platform
//! is a [`NullGateway`] so every outbound call can be asserted on.

use std::path::Path;
use std::sync::Arc;

use gatekeeper_gateway::GatewayError;
use gatekeeper_groups::MatchMethod;
use gatekeeper_node::{
    AdmissionController, AdmissionMetrics, ContactOutcome, DeclineOutcome, HoldReason,
    JoinOutcome, ReconcileOutcome, Stores,
};
use gatekeeper_nullables::{NullClock, NullGateway};
use gatekeeper_store::{GroupStore, JoinRequestLedger, VerificationStore};
use gatekeeper_store_lmdb::LmdbEnvironment;
use gatekeeper_types::{ChatId, JoinStatus, PolicyScope, UserId, UserProfile};
use gatekeeper_verification::PhoneVerifier;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ADMIN: UserId = UserId::new(1);
const CHAT_X: ChatId = ChatId::new(-100_111);
const CHAT_Y: ChatId = ChatId::new(-100_222);
const PH_NUMBER: &str = "+639171234567";

struct Bot {
    env: LmdbEnvironment,
    gateway: Arc<NullGateway>,
    clock: Arc<NullClock>,
    controller: AdmissionController,
}

fn open(path: &Path, gateway: Arc<NullGateway>) -> Bot {
    let env = LmdbEnvironment::open(path, 16 * 1024 * 1024).expect("open env");
    let stores = Stores {
        verification: Arc::new(env.verification_store()),
        ledger: Arc::new(env.join_request_store()),
        groups: Arc::new(env.group_store()),
    };
    let clock = Arc::new(NullClock::default());
    let controller = AdmissionController::new(
        stores,
        gateway.clone(),
        PhoneVerifier::with_default_region("PH").expect("known region"),
        clock.clone(),
        ADMIN,
        Arc::new(AdmissionMetrics::new().expect("metrics")),
    );
    controller
        .seed_default_policy(&["PH".to_string()])
        .expect("seed policy");
    controller.refresh_registry().expect("load registry");
    Bot {
        env,
        gateway,
        clock,
        controller,
    }
}

fn fresh() -> (tempfile::TempDir, Bot) {
    let dir = tempfile::tempdir().expect("temp dir");
    let bot = open(dir.path(), Arc::new(NullGateway::new()));
    (dir, bot)
}

fn ana() -> UserProfile {
    UserProfile::new(UserId::new(42), "Ana").with_handle("ana")
}

fn status(bot: &Bot, chat: ChatId) -> JoinStatus {
    bot.env
        .join_request_store()
        .get(ana().id, chat)
        .expect("read ledger")
        .expect("pair recorded")
        .status
}

/// Two managed groups bound to X and Y.
fn bind_two_groups(bot: &Bot) {
    let x = bot
        .controller
        .add_group("Manila Devs", "Meetups", "https://t.me/manila_devs")
        .expect("add x");
    let y = bot
        .controller
        .add_group("Cebu Devs", "Meetups", "https://t.me/cebu_devs")
        .expect("add y");
    let groups = bot.env.group_store();
    groups.bind_chat_id(x.id, CHAT_X).expect("bind x");
    groups.bind_chat_id(y.id, CHAT_Y).expect("bind y");
    bot.controller.refresh_registry().expect("refresh");
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unverified_join_then_verification_approves_exactly_once() {
    let (_dir, bot) = fresh();
    bot.controller
        .add_group("Manila Devs", "Meetups", "https://t.me/manila_devs")
        .unwrap();
    bot.gateway.add_chat(CHAT_X, "Manila Devs", Some("manila_devs"));

    let bound = bot
        .controller
        .on_bot_added(CHAT_X, "Manila Devs", Some("manila_devs"))
        .await
        .unwrap();
    assert!(matches!(
        bound,
        ReconcileOutcome::Bound {
            method: MatchMethod::PublicHandle,
            ..
        }
    ));

    let held = bot
        .controller
        .on_join_request(&ana(), CHAT_X, "Manila Devs")
        .await
        .unwrap();
    assert_eq!(held, JoinOutcome::Held(HoldReason::Unverified));
    assert_eq!(status(&bot, CHAT_X), JoinStatus::Pending);
    assert!(bot.gateway.approvals().is_empty());

    let outcome = bot
        .controller
        .on_contact_shared(&ana(), Some(ana().id), PH_NUMBER)
        .await
        .unwrap();
    let ContactOutcome::Verified { record, sweep } = outcome else {
        panic!("expected verification, got {outcome:?}");
    };

    assert_eq!(record.region.as_deref(), Some("PH"));
    assert_eq!(sweep.approved, [CHAT_X]);
    assert_eq!(bot.gateway.approvals(), [(CHAT_X, ana().id)]);
    assert!(bot.gateway.declines().is_empty());
    assert_eq!(status(&bot, CHAT_X), JoinStatus::Approved);
    assert!(bot
        .gateway
        .messages_to(ana().id)
        .iter()
        .any(|m| m.contains("approved to join Manila Devs")));
}

#[tokio::test]
async fn verifying_twice_keeps_one_record_and_approves_nothing_new() {
    let (_dir, bot) = fresh();
    bot.controller
        .on_join_request(&ana(), CHAT_X, "X")
        .await
        .unwrap();
    bot.controller
        .on_contact_shared(&ana(), Some(ana().id), PH_NUMBER)
        .await
        .unwrap();
    bot.clock.advance(3_600);

    let again = bot
        .controller
        .on_contact_shared(&ana(), Some(ana().id), PH_NUMBER)
        .await
        .unwrap();

    let ContactOutcome::Verified { record, sweep } = again else {
        panic!("expected verification");
    };
    assert_eq!(sweep.attempted(), 0);
    assert_eq!(record.verified_at.map(|t| t.as_secs()), Some(1_700_003_600));
    assert_eq!(bot.controller.stats().unwrap().verified, 1);
    assert_eq!(bot.gateway.approvals().len(), 1);
}

#[tokio::test]
async fn pending_requests_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(NullGateway::new());
    {
        let bot = open(dir.path(), gateway.clone());
        bot.controller
            .on_join_request(&ana(), CHAT_X, "X")
            .await
            .unwrap();
        bot.controller
            .on_join_request(&ana(), CHAT_Y, "Y")
            .await
            .unwrap();
    }

    let bot = open(dir.path(), gateway.clone());
    assert_eq!(bot.controller.stats().unwrap().pending, 2);
    gateway.fail_approvals_in(CHAT_X, GatewayError::NotFound("request expired".into()));

    let ContactOutcome::Verified { sweep, .. } = bot
        .controller
        .on_contact_shared(&ana(), Some(ana().id), PH_NUMBER)
        .await
        .unwrap()
    else {
        panic!("expected verification");
    };

    assert_eq!(sweep.approved, [CHAT_Y]);
    assert_eq!(sweep.failed.len(), 1);
    assert_eq!(status(&bot, CHAT_X), JoinStatus::Error);
    assert_eq!(status(&bot, CHAT_Y), JoinStatus::Approved);
}

#[tokio::test]
async fn ban_is_stored_even_when_one_chat_refuses() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(NullGateway::new());
    {
        let bot = open(dir.path(), gateway.clone());
        bind_two_groups(&bot);
        gateway.fail_bans_in(CHAT_X, GatewayError::Forbidden("not enough rights".into()));

        let report = bot.controller.ban(ana().id).await.unwrap();

        assert_eq!(report.attempted, [CHAT_X, CHAT_Y]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, CHAT_X);
        assert_eq!(
            gateway.bans(),
            [(CHAT_X, ana().id), (CHAT_Y, ana().id)]
        );
    }

    let bot = open(dir.path(), gateway);
    let record = bot
        .env
        .verification_store()
        .lookup(ana().id)
        .unwrap()
        .expect("placeholder created");
    assert!(record.banned);
    assert!(!record.is_verified());
}

#[tokio::test]
async fn banned_user_stays_pending_until_unbanned_and_redriven() {
    let (_dir, bot) = fresh();
    bot.controller
        .on_contact_shared(&ana(), Some(ana().id), PH_NUMBER)
        .await
        .unwrap();
    bot.controller.ban(ana().id).await.unwrap();

    let outcome = bot
        .controller
        .on_join_request(&ana(), CHAT_X, "X")
        .await
        .unwrap();
    assert_eq!(outcome, JoinOutcome::Held(HoldReason::Banned));
    assert!(bot.gateway.declines().is_empty());

    assert!(bot.controller.unban(ana().id).unwrap());
    let report = bot.controller.redrive(ana().id).await.unwrap();
    assert_eq!(report.approved, [CHAT_X]);
}

#[tokio::test]
async fn chat_policy_overrides_default() {
    let (_dir, bot) = fresh();
    bot.controller
        .set_policy(PolicyScope::Chat(CHAT_Y), ["SG"])
        .unwrap();
    bot.controller
        .on_contact_shared(&ana(), Some(ana().id), PH_NUMBER)
        .await
        .unwrap();

    assert_eq!(
        bot.controller
            .on_join_request(&ana(), CHAT_X, "X")
            .await
            .unwrap(),
        JoinOutcome::Approved
    );
    assert_eq!(
        bot.controller
            .on_join_request(&ana(), CHAT_Y, "Y")
            .await
            .unwrap(),
        JoinOutcome::Held(HoldReason::RegionNotAccepted {
            region: "PH".into()
        })
    );

    let policies = bot.controller.policies().unwrap();
    assert_eq!(policies.len(), 2);
}

#[tokio::test]
async fn exported_link_outranks_title_match() {
    let (_dir, bot) = fresh();
    let by_title = bot
        .controller
        .add_group("Manila Devs", "", "https://t.me/+AAAA")
        .unwrap();
    let by_link = bot
        .controller
        .add_group("Other", "", "https://t.me/+BBBB")
        .unwrap();
    bot.gateway.set_invite_link(CHAT_X, "https://t.me/+BBBB");

    let ReconcileOutcome::Bound { group, method } = bot
        .controller
        .on_bot_added(CHAT_X, "Manila Devs", None)
        .await
        .unwrap()
    else {
        panic!("expected binding");
    };

    assert_eq!(group.id, by_link.id);
    assert_eq!(method, MatchMethod::InviteLink);
    let stored = bot.env.group_store();
    assert_eq!(stored.get_group(by_link.id).unwrap().unwrap().chat_id, Some(CHAT_X));
    assert_eq!(stored.get_group(by_title.id).unwrap().unwrap().chat_id, None);
}

#[tokio::test]
async fn declined_pair_reopens_on_new_request() {
    let (_dir, bot) = fresh();
    bot.controller
        .on_join_request(&ana(), CHAT_X, "X")
        .await
        .unwrap();
    assert_eq!(
        bot.controller.decline(ana().id, CHAT_X).await.unwrap(),
        DeclineOutcome::Declined
    );
    assert_eq!(status(&bot, CHAT_X), JoinStatus::Declined);

    bot.clock.advance(10);
    bot.controller
        .on_join_request(&ana(), CHAT_X, "X")
        .await
        .unwrap();

    assert_eq!(status(&bot, CHAT_X), JoinStatus::Pending);
    assert_eq!(bot.controller.stats().unwrap().pending, 1);
}

#[tokio::test]
async fn contact_without_plus_is_checked_against_chat_policy() {
    let (_dir, bot) = fresh();
    bot.controller
        .set_policy(PolicyScope::Chat(CHAT_Y), ["US"])
        .unwrap();
    bot.controller
        .on_join_request(&ana(), CHAT_Y, "Y")
        .await
        .unwrap();

    let outcome = bot
        .controller
        .on_contact_shared(&ana(), Some(ana().id), "16502530000")
        .await
        .unwrap();

    let ContactOutcome::Verified { record, sweep } = outcome else {
        panic!("expected verification, got {outcome:?}");
    };
    assert_eq!(record.region.as_deref(), Some("US"));
    assert_eq!(sweep.approved, [CHAT_Y]);
    assert_eq!(status(&bot, CHAT_Y), JoinStatus::Approved);
}
