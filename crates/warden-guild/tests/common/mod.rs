//! Shared harness for router-level tests

#![allow(dead_code)]

use std::sync::Arc;
use warden_core::effects::RandomEffects;
use warden_core::{
    GuildConfig, GuildEvent, Interaction, InteractionId, Member, MessageId, MessageRef,
    ReactionEvent,
};
use warden_effects::{MemoryAnchorStore, RealTimeHandler};
use warden_guild::{GuildEffects, GuildRouter, TICKET_BUTTON_ID};
use warden_testkit::fixtures::{GENERAL_CHANNEL, ROLE_CHANNEL, TICKET_CHANNEL, VOTE_CHANNEL};
use warden_testkit::{init_test_tracing, test_config, MockPlatform, SeededRandom};

pub struct Harness {
    pub platform: MockPlatform,
    pub store: MemoryAnchorStore,
    pub router: Arc<GuildRouter>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_random(test_config(), SeededRandom::deterministic())
    }

    pub fn with_random(config: GuildConfig, random: impl RandomEffects + 'static) -> Self {
        init_test_tracing();
        let platform = MockPlatform::new();
        platform.add_text_channel(TICKET_CHANNEL, "tickets");
        platform.add_text_channel(ROLE_CHANNEL, "roles");
        platform.add_text_channel(VOTE_CHANNEL, "votes");
        platform.add_text_channel(GENERAL_CHANNEL, "general");

        Self::over(platform, MemoryAnchorStore::new(), &config, random)
    }

    /// A fresh router over the same guild and anchor store, as after a restart
    pub fn restarted(&self) -> Self {
        Self::over(
            self.platform.clone(),
            self.store.clone(),
            &test_config(),
            SeededRandom::deterministic(),
        )
    }

    /// Router over an existing guild and store
    pub fn over(
        platform: MockPlatform,
        store: MemoryAnchorStore,
        config: &GuildConfig,
        random: impl RandomEffects + 'static,
    ) -> Self {
        let effects = GuildEffects::new(
            Arc::new(platform.clone()),
            Arc::new(store.clone()),
            Arc::new(RealTimeHandler::new()),
            Arc::new(random),
        );
        let router = Arc::new(GuildRouter::new(config, effects));
        Self {
            platform,
            store,
            router,
        }
    }

    /// Deliver one event and wait for its handler
    pub async fn deliver(&self, event: GuildEvent) {
        self.router.handle(event).await;
    }

    /// Press the ticket button as `member`
    pub async fn press_ticket_button(&self, member: &Member, interaction: u64) -> InteractionId {
        let id = InteractionId::new(interaction);
        self.deliver(GuildEvent::InteractionCreated(Interaction {
            id,
            custom_id: TICKET_BUTTON_ID.to_string(),
            channel_id: TICKET_CHANNEL,
            member: member.clone(),
        }))
        .await;
        id
    }

    /// Post `content` in `channel` as `member` and route it
    pub async fn say(&self, channel: warden_core::ChannelId, member: &Member, content: &str) {
        let message = self.platform.post_message(channel, member, content);
        self.deliver(GuildEvent::MessageCreated(message)).await;
    }

    /// Reply in the member's DM channel and route it
    pub async fn reply_in_dm(&self, member: &Member, content: &str) {
        let message = self.platform.reply_in_dm(member, content);
        self.deliver(GuildEvent::MessageCreated(message)).await;
    }
}

/// Yield until `condition` holds; background tasks run in between
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Reaction by `member` on `message`
pub fn reaction(message: MessageRef, member: &Member, symbol: &str) -> ReactionEvent {
    ReactionEvent {
        message_id: message.message_id,
        channel_id: message.channel_id,
        user_id: member.user_id,
        symbol: symbol.to_string(),
        user_is_bot: member.bot,
    }
}

/// Reaction on a message that is not an anchor
pub fn stray_reaction(member: &Member, symbol: &str) -> ReactionEvent {
    reaction(
        MessageRef {
            channel_id: ROLE_CHANNEL,
            message_id: MessageId::new(424242),
        },
        member,
        symbol,
    )
}
