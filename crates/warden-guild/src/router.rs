//! Event router
//!
//! Delivers gateway events to the coordination services. Events that share a
//! subject run one at a time in arrival order; distinct subjects run
//! concurrently. A failing handler is logged and never stops the loop.

use crate::anchor::{AnchorSpec, ResolutionPath};
use crate::commands::{Command, CommandError};
use crate::error::{AnchorError, ModerationError, TicketError};
use crate::moderation::BanDuration;
use crate::services::{role_anchor_spec, ticket_anchor_spec, GuildEffects, GuildServices};
use crate::task_registry::TaskRegistry;
use crate::ticket::TICKET_BUTTON_ID;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use warden_core::effects::GuildPlatformEffects;
use warden_core::{
    Actor, ChannelId, GuildConfig, GuildEvent, Interaction, Member, Message, MessageId,
    MessageRef, OutgoingMessage, ReactionEvent, UserId, WardenError,
};

const NOT_A_TICKET_TEXT: &str = "This command can only be used inside a ticket channel.";
const CLOSE_FORBIDDEN_TEXT: &str = "You don't have permission to close this ticket.";
const BAN_FORBIDDEN_TEXT: &str = "You don't have permission to ban members.";
const INVALID_DURATION_TEXT: &str =
    "Invalid duration format. Use number + 'd' or 'h', or 'permanent'.";
const TICKET_EXISTS_TEXT: &str = "You already have an open ticket!";
const TICKET_FAILED_TEXT: &str = "Could not create your ticket. Please try again later.";

/// Anchor resolution results at startup
#[derive(Debug)]
pub struct StartupReport {
    /// Ticket-button anchor
    pub ticket_anchor: Result<(MessageRef, ResolutionPath), AnchorError>,
    /// Role-reaction anchor
    pub role_anchor: Result<(MessageRef, ResolutionPath), AnchorError>,
}

impl StartupReport {
    /// Both anchors resolved
    pub fn is_ready(&self) -> bool {
        self.ticket_anchor.is_ok() && self.role_anchor.is_ok()
    }
}

/// What an event is about; the platform orders events per subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Subject {
    /// Joins, departures, bans, DM replies and button presses of one user
    Member(UserId),
    /// One user's reactions on one message
    Reaction(MessageId, UserId),
    /// Guild messages in one channel
    Channel(ChannelId),
}

impl Subject {
    fn of(event: &GuildEvent) -> Self {
        match event {
            GuildEvent::MemberJoined(member) => Self::Member(member.user_id),
            GuildEvent::MemberLeft(user)
            | GuildEvent::MemberBanned(user)
            | GuildEvent::MemberUnbanned(user) => Self::Member(*user),
            GuildEvent::MessageCreated(message) if message.is_direct => {
                Self::Member(message.author.user_id)
            }
            GuildEvent::MessageCreated(message) => Self::Channel(message.channel_id),
            GuildEvent::ReactionAdded(reaction) | GuildEvent::ReactionRemoved(reaction) => {
                Self::Reaction(reaction.message_id, reaction.user_id)
            }
            GuildEvent::InteractionCreated(interaction) => {
                Self::Member(interaction.member.user_id)
            }
        }
    }
}

/// Guild event router
pub struct GuildRouter {
    platform: Arc<dyn GuildPlatformEffects>,
    services: GuildServices,
    tasks: Arc<TaskRegistry>,
    // A subject is present while a task is draining its events.
    queued: Mutex<HashMap<Subject, VecDeque<GuildEvent>>>,
    prefix: String,
    ticket_anchor: AnchorSpec,
    role_anchor: AnchorSpec,
}

impl std::fmt::Debug for GuildRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildRouter")
            .field("prefix", &self.prefix)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}

impl GuildRouter {
    /// Create a new router and its services
    pub fn new(config: &GuildConfig, effects: GuildEffects) -> Self {
        let tasks = Arc::new(TaskRegistry::new());
        let services = GuildServices::new(config, &effects, tasks.clone());
        Self {
            platform: effects.platform,
            services,
            tasks,
            queued: Mutex::new(HashMap::new()),
            prefix: config.prefix.clone(),
            ticket_anchor: ticket_anchor_spec(config),
            role_anchor: role_anchor_spec(config),
        }
    }

    /// Services driven by this router
    pub fn services(&self) -> &GuildServices {
        &self.services
    }

    /// Resolve both anchors
    ///
    /// An unreachable channel is logged and leaves that feature inactive;
    /// the other anchor is still resolved.
    pub async fn start(&self) -> StartupReport {
        let anchors = &self.services.anchors;
        let (ticket_anchor, role_anchor) = futures::join!(
            anchors.resolve_with_path(&self.ticket_anchor),
            anchors.resolve_with_path(&self.role_anchor),
        );

        for (name, result) in [
            (self.ticket_anchor.name.as_str(), &ticket_anchor),
            (self.role_anchor.name.as_str(), &role_anchor),
        ] {
            match result {
                Ok((message, path)) => {
                    tracing::info!(anchor = name, message = %message.message_id, path = ?path, "anchor ready");
                }
                Err(e) => tracing::error!(anchor = name, error = %e, "anchor unavailable"),
            }
        }

        StartupReport {
            ticket_anchor,
            role_anchor,
        }
    }

    /// Consume events until the channel closes or the router shuts down
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<GuildEvent>) {
        tracing::info!("event router started");
        while let Some(event) = events.recv().await {
            if self.tasks.is_shutdown() {
                break;
            }
            self.dispatch(event);
        }
        tracing::info!("event router stopped");
    }

    /// Handle `event` in a background task, after every earlier event for
    /// the same subject
    pub fn dispatch(self: &Arc<Self>, event: GuildEvent) {
        if self.tasks.is_shutdown() {
            tracing::debug!(event = event.kind(), "router shut down, dropping event");
            return;
        }

        let subject = Subject::of(&event);
        {
            let mut queued = self.queued.lock();
            if let Some(queue) = queued.get_mut(&subject) {
                queue.push_back(event);
                return;
            }
            queued.insert(subject, VecDeque::new());
        }

        let router = self.clone();
        self.tasks.spawn_cancellable(async move {
            router.drain(subject, event).await;
        });
    }

    /// Subjects with a handler running or events waiting
    pub fn busy_subjects(&self) -> usize {
        self.queued.lock().len()
    }

    /// Handle one event to completion, logging any failure
    pub async fn handle(&self, event: GuildEvent) {
        let kind = event.kind();
        tracing::trace!(event = kind, "dispatching event");
        if let Err(e) = self.route(event).await {
            tracing::warn!(event = kind, error = %e, "event handler failed");
        }
    }

    /// Stop every background task: event handlers, verification waits and
    /// scheduled unbans
    pub fn shutdown(&self) {
        self.tasks.shutdown();
    }

    async fn drain(&self, subject: Subject, first: GuildEvent) {
        let mut next = Some(first);
        while let Some(event) = next {
            self.handle(event).await;
            next = self.next_queued(subject);
        }
    }

    fn next_queued(&self, subject: Subject) -> Option<GuildEvent> {
        let mut queued = self.queued.lock();
        let next = queued.get_mut(&subject).and_then(VecDeque::pop_front);
        if next.is_none() {
            queued.remove(&subject);
        }
        next
    }

    async fn route(&self, event: GuildEvent) -> Result<(), WardenError> {
        match event {
            GuildEvent::MemberJoined(member) => self.on_member_joined(&member).await,
            GuildEvent::MemberLeft(user) | GuildEvent::MemberBanned(user) => {
                self.on_member_departed(user).await;
                Ok(())
            }
            GuildEvent::MemberUnbanned(user) => {
                self.services.moderation.on_member_unbanned(user);
                Ok(())
            }
            GuildEvent::MessageCreated(message) => self.on_message(&message).await,
            GuildEvent::ReactionAdded(reaction) => {
                self.on_reaction(&reaction, true).await;
                Ok(())
            }
            GuildEvent::ReactionRemoved(reaction) => {
                self.on_reaction(&reaction, false).await;
                Ok(())
            }
            GuildEvent::InteractionCreated(interaction) => self.on_interaction(&interaction).await,
        }
    }

    async fn on_member_joined(&self, member: &Member) -> Result<(), WardenError> {
        if member.user_id == self.platform.system_user() {
            return Ok(());
        }
        self.services.verification.begin(member).await?;
        Ok(())
    }

    async fn on_member_departed(&self, user: UserId) {
        self.services.verification.on_member_departure(user);
        self.services.tickets.on_member_departure(user).await;
    }

    async fn on_reaction(&self, reaction: &ReactionEvent, added: bool) {
        let roles = &self.services.roles;
        let outcome = if added {
            roles.on_reaction_added(reaction).await
        } else {
            roles.on_reaction_removed(reaction).await
        };
        tracing::trace!(user = %reaction.user_id, outcome = ?outcome, "reaction handled");
    }

    async fn on_message(&self, message: &Message) -> Result<(), WardenError> {
        if message.author.user_id == self.platform.system_user() {
            return Ok(());
        }
        if message.is_direct {
            self.services.verification.offer_reply(message);
            return Ok(());
        }
        if message.author.bot {
            return Ok(());
        }

        self.services.moderation.apply_vote_reactions(message).await;

        match Command::parse(&self.prefix, &message.content) {
            None => Ok(()),
            Some(Err(e)) => {
                self.reply(message.channel_id, self.usage_text(&e)).await;
                Ok(())
            }
            Some(Ok(Command::Close)) => self.close_ticket(message).await,
            Some(Ok(Command::Ban {
                target,
                duration,
                reason,
            })) => self.ban(message, target, duration.as_deref(), &reason).await,
        }
    }

    async fn close_ticket(&self, message: &Message) -> Result<(), WardenError> {
        let actor = Actor::from(&message.author);
        match self.services.tickets.close(&actor, message.channel_id).await {
            Ok(_) => Ok(()),
            Err(TicketError::NotATicketChannel(_)) => {
                self.reply(message.channel_id, NOT_A_TICKET_TEXT).await;
                Ok(())
            }
            Err(TicketError::Forbidden { .. }) => {
                self.reply(message.channel_id, CLOSE_FORBIDDEN_TEXT).await;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ban(
        &self,
        message: &Message,
        target: UserId,
        duration: Option<&str>,
        reason: &str,
    ) -> Result<(), WardenError> {
        let actor = Actor::from(&message.author);
        if !actor.permissions.ban_members {
            self.reply(message.channel_id, BAN_FORBIDDEN_TEXT).await;
            return Ok(());
        }
        let Ok(duration) = BanDuration::parse(duration) else {
            self.reply(message.channel_id, INVALID_DURATION_TEXT).await;
            return Ok(());
        };

        match self
            .services
            .moderation
            .ban(&actor, target, duration, reason, message.channel_id)
            .await
        {
            Ok(_) => Ok(()),
            Err(ModerationError::MissingPermission(_)) => {
                self.reply(message.channel_id, BAN_FORBIDDEN_TEXT).await;
                Ok(())
            }
            Err(e) => {
                self.reply(message.channel_id, format!("Could not ban {}.", target.mention()))
                    .await;
                Err(e.into())
            }
        }
    }

    async fn on_interaction(&self, interaction: &Interaction) -> Result<(), WardenError> {
        if interaction.custom_id != TICKET_BUTTON_ID {
            tracing::debug!(custom_id = %interaction.custom_id, "ignoring unknown interaction");
            return Ok(());
        }

        let answer = match self.services.tickets.open(&interaction.member).await {
            Ok(ticket) => format!("Your ticket has been created: {}", ticket.channel_id.mention()),
            Err(TicketError::AlreadyOpen { .. }) => TICKET_EXISTS_TEXT.to_string(),
            Err(e) => {
                tracing::warn!(user = %interaction.member.user_id, error = %e, "failed to open ticket");
                TICKET_FAILED_TEXT.to_string()
            }
        };
        self.platform
            .respond_ephemeral(interaction.id, &answer)
            .await?;
        Ok(())
    }

    fn usage_text(&self, error: &CommandError) -> String {
        match error {
            CommandError::MissingArgument { usage } => format!("Usage: `{}{usage}`", self.prefix),
            CommandError::InvalidUser(raw) => format!("Could not find user '{raw}'."),
        }
    }

    async fn reply(&self, channel: ChannelId, text: impl Into<String>) {
        if let Err(e) = self
            .platform
            .send_channel_message(channel, OutgoingMessage::text(text))
            .await
        {
            tracing::warn!(channel = %channel, error = %e, "failed to reply");
        }
    }
}
