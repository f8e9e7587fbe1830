//! Integration Tests for the Ticket Lifecycle
//!
//! Drives tickets through the router the way the gateway would: button
//! presses, `!close` commands and member departures.

mod common;

use common::Harness;
use proptest::prelude::*;
use std::sync::Arc;
use warden_core::{Actor, GuildEvent};
use warden_effects::RealTimeHandler;
use warden_guild::{TicketError, TicketRegistry};
use warden_testkit::fixtures::{GENERAL_CHANNEL, STAFF_ROLE};
use warden_testkit::{test_member, test_staff, MockPlatform, PlatformAction};

// ============================================================================
// Lifecycle Through the Router
// ============================================================================

#[tokio::test]
async fn test_open_reject_close_reopen() {
    let harness = Harness::new();
    let tickets = harness.router.services().tickets.clone();
    let user = test_member(10, "alice");
    let staff = test_staff(11, "sam");

    let first_press = harness.press_ticket_button(&user, 1).await;
    let ticket = tickets.ticket_for_owner(user.user_id).unwrap();
    assert_eq!(
        harness.platform.ephemeral_replies(first_press),
        vec![format!("Your ticket has been created: <#{}>", ticket.channel_id)]
    );

    let second_press = harness.press_ticket_button(&user, 2).await;
    assert_eq!(
        harness.platform.ephemeral_replies(second_press),
        vec!["You already have an open ticket!".to_string()]
    );
    assert_eq!(harness.platform.channels_named("ticket-"), 1);

    harness.say(ticket.channel_id, &staff, "!close").await;
    assert!(!harness.platform.channel_exists(ticket.channel_id));
    assert_eq!(tickets.ticket_for_owner(user.user_id), None);

    harness.press_ticket_button(&user, 3).await;
    let reopened = tickets.ticket_for_owner(user.user_id).unwrap();
    assert_ne!(reopened.channel_id, ticket.channel_id);
}

#[tokio::test]
async fn test_owner_may_close_own_ticket() {
    let harness = Harness::new();
    let user = test_member(10, "alice");
    harness.press_ticket_button(&user, 1).await;
    let ticket = harness
        .router
        .services()
        .tickets
        .ticket_for_owner(user.user_id)
        .unwrap();

    harness.say(ticket.channel_id, &user, "!close").await;
    assert!(!harness.platform.channel_exists(ticket.channel_id));
}

#[tokio::test]
async fn test_third_party_close_is_refused_once() {
    let harness = Harness::new();
    let user = test_member(10, "alice");
    let stranger = test_member(12, "mallory");
    harness.press_ticket_button(&user, 1).await;
    let tickets = harness.router.services().tickets.clone();
    let ticket = tickets.ticket_for_owner(user.user_id).unwrap();

    // The stranger cannot normally see the channel; simulate a leaked permission.
    harness.say(ticket.channel_id, &stranger, "!close").await;

    assert!(harness.platform.channel_exists(ticket.channel_id));
    assert_eq!(tickets.ticket_for_owner(user.user_id), Some(ticket.clone()));
    let refusals: Vec<_> = harness
        .platform
        .channel_texts(ticket.channel_id)
        .into_iter()
        .filter(|t| t.contains("permission"))
        .collect();
    assert_eq!(refusals.len(), 1);
}

#[tokio::test]
async fn test_close_outside_ticket_channel_explains() {
    let harness = Harness::new();
    let staff = test_staff(11, "sam");

    harness.say(GENERAL_CHANNEL, &staff, "!close").await;
    assert_eq!(
        harness.platform.channel_texts(GENERAL_CHANNEL),
        vec!["This command can only be used inside a ticket channel.".to_string()]
    );
}

#[tokio::test]
async fn test_departure_and_ban_auto_close() {
    let harness = Harness::new();
    let alice = test_member(10, "alice");
    let bob = test_member(13, "bob");
    harness.press_ticket_button(&alice, 1).await;
    harness.press_ticket_button(&bob, 2).await;
    let tickets = harness.router.services().tickets.clone();
    assert_eq!(tickets.open_count(), 2);

    harness.deliver(GuildEvent::MemberLeft(alice.user_id)).await;
    harness.deliver(GuildEvent::MemberBanned(bob.user_id)).await;

    assert_eq!(tickets.open_count(), 0);
    assert_eq!(harness.platform.channels_named("ticket-"), 0);
}

#[tokio::test]
async fn test_failed_channel_creation_answers_once() {
    let harness = Harness::new();
    let user = test_member(10, "alice");
    harness.platform.fail_next_channel_creation();

    let press = harness.press_ticket_button(&user, 1).await;
    assert_eq!(harness.platform.ephemeral_replies(press).len(), 1);
    assert_eq!(harness.router.services().tickets.open_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_presses_open_one_ticket() {
    let harness = Harness::new();
    let user = test_member(10, "alice");

    let mut tasks = Vec::new();
    for i in 0..8 {
        let router = harness.router.clone();
        let user = user.clone();
        tasks.push(tokio::spawn(async move {
            router
                .handle(GuildEvent::InteractionCreated(warden_core::Interaction {
                    id: warden_core::InteractionId::new(100 + i),
                    custom_id: warden_guild::TICKET_BUTTON_ID.to_string(),
                    channel_id: warden_testkit::fixtures::TICKET_CHANNEL,
                    member: user,
                }))
                .await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(harness.platform.channels_named("ticket-"), 1);
    let rejections = harness.platform.count_actions(|a| {
        matches!(a, PlatformAction::Ephemeral { content, .. } if content == "You already have an open ticket!")
    });
    assert_eq!(rejections, 7);
}

// ============================================================================
// Property Tests
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Op {
    Open(u64),
    CloseByOwner(u64),
    CloseByStaff(u64),
    CloseByStranger(u64),
    Depart(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let user = 20u64..24;
    prop_oneof![
        user.clone().prop_map(Op::Open),
        user.clone().prop_map(Op::CloseByOwner),
        user.clone().prop_map(Op::CloseByStaff),
        user.clone().prop_map(Op::CloseByStranger),
        user.prop_map(Op::Depart),
    ]
}

proptest! {
    #[test]
    fn ticket_map_stays_a_bijection(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let platform = MockPlatform::new();
        let tickets = TicketRegistry::new(
            Arc::new(platform.clone()),
            Arc::new(RealTimeHandler::new()),
            STAFF_ROLE,
            "!",
        );
        let staff = Actor::from(&test_staff(90, "staff"));
        let stranger = Actor::from(&test_member(91, "stranger"));
        let mut model = std::collections::BTreeSet::new();

        futures::executor::block_on(async {
            for op in ops {
                match op {
                    Op::Open(id) => {
                        let result = tickets.open(&test_member(id, "user")).await;
                        if model.insert(id) {
                            prop_assert!(result.is_ok());
                        } else {
                            let is_already_open = matches!(result, Err(TicketError::AlreadyOpen { .. }));
                            prop_assert!(is_already_open);
                        }
                    }
                    Op::CloseByOwner(id) | Op::CloseByStaff(id) | Op::CloseByStranger(id) => {
                        let actor = match op {
                            Op::CloseByOwner(_) => Actor::from(&test_member(id, "user")),
                            Op::CloseByStaff(_) => staff.clone(),
                            _ => stranger.clone(),
                        };
                        let channel = tickets.ticket_for_owner(id.into()).map(|t| t.channel_id);
                        if let Some(channel) = channel {
                            let result = tickets.close(&actor, channel).await;
                            if matches!(op, Op::CloseByStranger(_)) {
                                let is_forbidden = matches!(result, Err(TicketError::Forbidden { .. }));
                                prop_assert!(is_forbidden);
                            } else {
                                prop_assert!(result.is_ok());
                                model.remove(&id);
                            }
                        }
                    }
                    Op::Depart(id) => {
                        let closed = tickets.on_member_departure(id.into()).await;
                        prop_assert_eq!(closed.is_some(), model.remove(&id));
                    }
                }

                prop_assert_eq!(tickets.open_count(), model.len());
                let mut channels = std::collections::BTreeSet::new();
                for id in &model {
                    let ticket = tickets.ticket_for_owner((*id).into());
                    prop_assert!(ticket.is_some());
                    let ticket = ticket.unwrap();
                    prop_assert!(channels.insert(ticket.channel_id));
                    prop_assert_eq!(tickets.ticket_for_channel(ticket.channel_id).map(|t| t.owner_id), Some(ticket.owner_id));
                }
            }
            Ok(())
        })?;
    }
}
