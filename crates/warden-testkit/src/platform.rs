//! In-memory guild platform
//!
//! `MockPlatform` behaves like the real platform where it matters to the
//! coordinator: missing targets answer `NotFound`, role changes are
//! idempotent, history is returned newest first. Faults are injected per
//! channel, per role, or for the next channel creation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use warden_core::effects::{GuildPlatformEffects, PlatformResult};
use warden_core::{
    ChannelId, ChannelSpec, InteractionId, Member, Message, MessageId, MessageRef,
    OutgoingMessage, PermissionOverwrite, PlatformError, RoleId, UserId,
};

/// Id of the system user in every mock guild
pub const SYSTEM_USER: UserId = UserId::new(1);

/// Outbound action observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformAction {
    /// Direct message sent
    SentDirect {
        /// Recipient
        user: UserId,
        /// Text content
        content: String,
    },
    /// Channel message sent
    SentChannel {
        /// Target channel
        channel: ChannelId,
        /// Text content
        content: String,
    },
    /// Ephemeral interaction reply
    Ephemeral {
        /// Answered interaction
        interaction: InteractionId,
        /// Reply text
        content: String,
    },
    /// Text channel created
    CreatedChannel {
        /// New channel
        channel: ChannelId,
        /// Its name
        name: String,
    },
    /// Channel deleted
    DeletedChannel {
        /// Deleted channel
        channel: ChannelId,
    },
    /// Role granted
    GrantedRole {
        /// Member
        user: UserId,
        /// Role
        role: RoleId,
    },
    /// Role revoked
    RevokedRole {
        /// Member
        user: UserId,
        /// Role
        role: RoleId,
    },
    /// Member removed from the guild
    RemovedMember {
        /// Member
        user: UserId,
    },
    /// User banned
    Banned {
        /// User
        user: UserId,
    },
    /// Ban lifted
    Unbanned {
        /// User
        user: UserId,
    },
    /// Reaction added by the system user
    AddedReaction {
        /// Target message
        message: MessageRef,
        /// Symbol
        symbol: String,
    },
    /// Reactions cleared
    ClearedReactions {
        /// Target message
        message: MessageRef,
    },
}

/// Snapshot of a mock channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    /// Channel name
    pub name: String,
    /// Channel topic
    pub topic: String,
    /// Overwrites applied at creation
    pub overwrites: Vec<PermissionOverwrite>,
    /// Direct-message channel
    pub is_direct: bool,
}

#[derive(Debug)]
struct StoredMessage {
    message: Message,
    outgoing: Option<OutgoingMessage>,
    reactions: BTreeMap<String, BTreeSet<UserId>>,
}

#[derive(Debug)]
struct MockChannel {
    name: String,
    topic: String,
    category: Option<ChannelId>,
    is_direct: bool,
    overwrites: Vec<PermissionOverwrite>,
    messages: Vec<StoredMessage>,
}

impl MockChannel {
    fn new(name: impl Into<String>, category: Option<ChannelId>, is_direct: bool) -> Self {
        Self {
            name: name.into(),
            topic: String::new(),
            category,
            is_direct,
            overwrites: Vec::new(),
            messages: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    forbidden_roles: BTreeSet<RoleId>,
    unreachable_channels: BTreeSet<ChannelId>,
    closed_dms: BTreeSet<UserId>,
    fail_next_channel_creation: bool,
    fail_reactions: bool,
    role_grant_delay: Option<Duration>,
}

#[derive(Debug)]
struct PlatformState {
    next_id: u64,
    channels: BTreeMap<ChannelId, MockChannel>,
    members: BTreeMap<UserId, Member>,
    dm_channels: BTreeMap<UserId, ChannelId>,
    bans: BTreeSet<UserId>,
    actions: Vec<PlatformAction>,
    faults: Faults,
}

impl PlatformState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn reachable_channel(&mut self, channel: ChannelId) -> PlatformResult<&mut MockChannel> {
        if self.faults.unreachable_channels.contains(&channel) {
            return Err(PlatformError::Forbidden(format!(
                "missing access to channel {channel}"
            )));
        }
        self.channels
            .get_mut(&channel)
            .ok_or_else(|| PlatformError::NotFound(format!("unknown channel {channel}")))
    }

    fn push_message(
        &mut self,
        channel: ChannelId,
        author: Member,
        outgoing: Option<OutgoingMessage>,
        content: String,
    ) -> PlatformResult<Message> {
        let id = MessageId::new(self.allocate());
        let target = self.reachable_channel(channel)?;
        let embed_title = outgoing
            .as_ref()
            .and_then(|o| o.embed.as_ref())
            .map(|e| e.title.clone());
        let message = Message {
            id,
            channel_id: channel,
            category_id: target.category,
            is_direct: target.is_direct,
            author,
            content,
            embed_title,
        };
        target.messages.push(StoredMessage {
            message: message.clone(),
            outgoing,
            reactions: BTreeMap::new(),
        });
        Ok(message)
    }

    fn stored_message(&mut self, message: MessageRef) -> PlatformResult<&mut StoredMessage> {
        let channel = self.reachable_channel(message.channel_id)?;
        channel
            .messages
            .iter_mut()
            .find(|m| m.message.id == message.message_id)
            .ok_or_else(|| PlatformError::NotFound(format!("unknown message {}", message.message_id)))
    }

    fn system_member() -> Member {
        let mut member = Member::new(SYSTEM_USER, "warden");
        member.bot = true;
        member
    }
}

/// In-memory guild implementing `GuildPlatformEffects`
#[derive(Debug, Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Empty guild; allocated ids start above 1000
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PlatformState {
                next_id: 1000,
                channels: BTreeMap::new(),
                members: BTreeMap::new(),
                dm_channels: BTreeMap::new(),
                bans: BTreeSet::new(),
                actions: Vec::new(),
                faults: Faults::default(),
            })),
        }
    }

    // ------------------------------------------------------------------
    // Guild setup
    // ------------------------------------------------------------------

    /// Create a text channel with a known id
    pub fn add_text_channel(&self, id: ChannelId, name: &str) -> ChannelId {
        self.state
            .lock()
            .channels
            .insert(id, MockChannel::new(name, None, false));
        id
    }

    /// Create a text channel under a category
    pub fn add_channel_in_category(&self, id: ChannelId, name: &str, category: ChannelId) -> ChannelId {
        self.state
            .lock()
            .channels
            .insert(id, MockChannel::new(name, Some(category), false));
        id
    }

    /// Add a member to the guild
    pub fn add_member(&self, member: Member) {
        self.state.lock().members.insert(member.user_id, member);
    }

    /// Remove a member out-of-band (leaving on their own)
    pub fn member_leaves(&self, user: UserId) {
        self.state.lock().members.remove(&user);
    }

    /// Post a message as `author` (a user message arriving from the gateway)
    pub fn post_message(&self, channel: ChannelId, author: &Member, content: &str) -> Message {
        let mut state = self.state.lock();
        match state.push_message(channel, author.clone(), None, content.to_string()) {
            Ok(message) => message,
            Err(e) => panic!("post_message into {channel}: {e}"),
        }
    }

    /// Post a message as the system user, bypassing the action log
    pub fn seed_system_message(&self, channel: ChannelId, outgoing: OutgoingMessage) -> Message {
        let mut state = self.state.lock();
        let content = outgoing.content.clone();
        match state.push_message(channel, PlatformState::system_member(), Some(outgoing), content) {
            Ok(message) => message,
            Err(e) => panic!("seed_system_message into {channel}: {e}"),
        }
    }

    /// Reply in the member's DM channel, as the member
    pub fn reply_in_dm(&self, member: &Member, content: &str) -> Message {
        let mut state = self.state.lock();
        let channel = match state.dm_channels.get(&member.user_id) {
            Some(channel) => *channel,
            None => panic!("no DM channel open with {}", member.user_id),
        };
        match state.push_message(channel, member.clone(), None, content.to_string()) {
            Ok(message) => message,
            Err(e) => panic!("reply_in_dm: {e}"),
        }
    }

    /// Delete a message out-of-band
    pub fn delete_message(&self, message: MessageRef) {
        let mut state = self.state.lock();
        if let Some(channel) = state.channels.get_mut(&message.channel_id) {
            channel.messages.retain(|m| m.message.id != message.message_id);
        }
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// Grants and revocations of `role` fail with `Forbidden`
    pub fn forbid_role(&self, role: RoleId) {
        self.state.lock().faults.forbidden_roles.insert(role);
    }

    /// Every call touching `channel` fails with `Forbidden`
    pub fn make_unreachable(&self, channel: ChannelId) {
        self.state.lock().faults.unreachable_channels.insert(channel);
    }

    /// Direct messages to `user` fail with `Forbidden`
    pub fn close_dms(&self, user: UserId) {
        self.state.lock().faults.closed_dms.insert(user);
    }

    /// The next channel creation fails with `Transient`
    pub fn fail_next_channel_creation(&self) {
        self.state.lock().faults.fail_next_channel_creation = true;
    }

    /// Reaction calls fail with `Transient`
    pub fn fail_reactions(&self) {
        self.state.lock().faults.fail_reactions = true;
    }

    /// Role grants wait `delay` before taking effect
    pub fn delay_role_grants(&self, delay: Duration) {
        self.state.lock().faults.role_grant_delay = Some(delay);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Every recorded action, in order
    pub fn actions(&self) -> Vec<PlatformAction> {
        self.state.lock().actions.clone()
    }

    /// Number of recorded actions matching `pred`
    pub fn count_actions(&self, pred: impl Fn(&PlatformAction) -> bool) -> usize {
        self.state.lock().actions.iter().filter(|a| pred(a)).count()
    }

    /// Number of messages the system user posted in guild channels
    pub fn channel_messages_sent(&self) -> usize {
        self.count_actions(|a| matches!(a, PlatformAction::SentChannel { .. }))
    }

    /// Texts of direct messages sent to `user`
    pub fn direct_messages_to(&self, user: UserId) -> Vec<String> {
        self.state
            .lock()
            .actions
            .iter()
            .filter_map(|a| match a {
                PlatformAction::SentDirect { user: u, content } if *u == user => {
                    Some(content.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Texts posted by the system user in `channel`
    pub fn channel_texts(&self, channel: ChannelId) -> Vec<String> {
        self.state
            .lock()
            .actions
            .iter()
            .filter_map(|a| match a {
                PlatformAction::SentChannel { channel: c, content } if *c == channel => {
                    Some(content.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Ephemeral replies sent for `interaction`
    pub fn ephemeral_replies(&self, interaction: InteractionId) -> Vec<String> {
        self.state
            .lock()
            .actions
            .iter()
            .filter_map(|a| match a {
                PlatformAction::Ephemeral {
                    interaction: i,
                    content,
                } if *i == interaction => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    /// Roles currently held by `user`
    pub fn member_roles(&self, user: UserId) -> BTreeSet<RoleId> {
        self.state
            .lock()
            .members
            .get(&user)
            .map(|m| m.roles.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Is `user` still in the guild
    pub fn is_member(&self, user: UserId) -> bool {
        self.state.lock().members.contains_key(&user)
    }

    /// Is `user` banned
    pub fn is_banned(&self, user: UserId) -> bool {
        self.state.lock().bans.contains(&user)
    }

    /// Does `channel` exist
    pub fn channel_exists(&self, channel: ChannelId) -> bool {
        self.state.lock().channels.contains_key(&channel)
    }

    /// Snapshot of `channel`
    pub fn channel(&self, channel: ChannelId) -> Option<ChannelSnapshot> {
        self.state.lock().channels.get(&channel).map(|c| ChannelSnapshot {
            name: c.name.clone(),
            topic: c.topic.clone(),
            overwrites: c.overwrites.clone(),
            is_direct: c.is_direct,
        })
    }

    /// Does the message still exist
    pub fn message_exists(&self, message: MessageRef) -> bool {
        self.state
            .lock()
            .channels
            .get(&message.channel_id)
            .map(|c| c.messages.iter().any(|m| m.message.id == message.message_id))
            .unwrap_or(false)
    }

    /// Buttons attached to a system message
    pub fn buttons_on(&self, message: MessageRef) -> Vec<String> {
        self.state
            .lock()
            .channels
            .get(&message.channel_id)
            .and_then(|c| c.messages.iter().find(|m| m.message.id == message.message_id))
            .and_then(|m| m.outgoing.as_ref())
            .map(|o| o.buttons.iter().map(|b| b.custom_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Symbols currently reacted on a message
    pub fn reactions_on(&self, message: MessageRef) -> Vec<String> {
        self.state
            .lock()
            .channels
            .get(&message.channel_id)
            .and_then(|c| c.messages.iter().find(|m| m.message.id == message.message_id))
            .map(|m| m.reactions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of text channels whose name starts with `prefix`
    pub fn channels_named(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .channels
            .values()
            .filter(|c| !c.is_direct && c.name.starts_with(prefix))
            .count()
    }

    fn record(&self, action: PlatformAction) {
        self.state.lock().actions.push(action);
    }
}

#[async_trait]
impl GuildPlatformEffects for MockPlatform {
    fn system_user(&self) -> UserId {
        SYSTEM_USER
    }

    async fn send_direct_message(
        &self,
        user: UserId,
        message: OutgoingMessage,
    ) -> PlatformResult<MessageRef> {
        let mut state = self.state.lock();
        if state.faults.closed_dms.contains(&user) {
            return Err(PlatformError::Forbidden(format!("cannot message {user}")));
        }

        let channel = match state.dm_channels.get(&user) {
            Some(channel) => *channel,
            None => {
                let channel = ChannelId::new(state.allocate());
                state
                    .channels
                    .insert(channel, MockChannel::new(format!("dm-{user}"), None, true));
                state.dm_channels.insert(user, channel);
                channel
            }
        };

        let content = message.content.clone();
        let sent = state.push_message(
            channel,
            PlatformState::system_member(),
            Some(message),
            content.clone(),
        )?;
        state.actions.push(PlatformAction::SentDirect { user, content });
        Ok(sent.reference())
    }

    async fn send_channel_message(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> PlatformResult<MessageRef> {
        let mut state = self.state.lock();
        let content = message.content.clone();
        let sent = state.push_message(
            channel,
            PlatformState::system_member(),
            Some(message),
            content.clone(),
        )?;
        state
            .actions
            .push(PlatformAction::SentChannel { channel, content });
        Ok(sent.reference())
    }

    async fn respond_ephemeral(
        &self,
        interaction: InteractionId,
        content: &str,
    ) -> PlatformResult<()> {
        self.record(PlatformAction::Ephemeral {
            interaction,
            content: content.to_string(),
        });
        Ok(())
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> PlatformResult<Message> {
        let mut state = self.state.lock();
        let target = MessageRef {
            channel_id: channel,
            message_id: message,
        };
        state.stored_message(target).map(|m| m.message.clone())
    }

    async fn channel_history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> PlatformResult<Vec<Message>> {
        let mut state = self.state.lock();
        let target = state.reachable_channel(channel)?;
        Ok(target
            .messages
            .iter()
            .rev()
            .take(limit)
            .map(|m| m.message.clone())
            .collect())
    }

    async fn add_reaction(&self, message: MessageRef, symbol: &str) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.faults.fail_reactions {
            return Err(PlatformError::Transient("reaction endpoint unavailable".into()));
        }
        state
            .stored_message(message)?
            .reactions
            .entry(symbol.to_string())
            .or_default()
            .insert(SYSTEM_USER);
        state.actions.push(PlatformAction::AddedReaction {
            message,
            symbol: symbol.to_string(),
        });
        Ok(())
    }

    async fn clear_reactions(&self, message: MessageRef) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.faults.fail_reactions {
            return Err(PlatformError::Transient("reaction endpoint unavailable".into()));
        }
        state.stored_message(message)?.reactions.clear();
        state
            .actions
            .push(PlatformAction::ClearedReactions { message });
        Ok(())
    }

    async fn create_text_channel(&self, spec: ChannelSpec) -> PlatformResult<ChannelId> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.faults.fail_next_channel_creation) {
            return Err(PlatformError::Transient("channel creation failed".into()));
        }

        let id = ChannelId::new(state.allocate());
        let mut channel = MockChannel::new(spec.name.clone(), None, false);
        channel.topic = spec.topic;
        channel.overwrites = spec.overwrites;
        state.channels.insert(id, channel);
        state.actions.push(PlatformAction::CreatedChannel {
            channel: id,
            name: spec.name,
        });
        Ok(id)
    }

    async fn delete_channel(&self, channel: ChannelId, _reason: &str) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.channels.remove(&channel).is_none() {
            return Err(PlatformError::NotFound(format!("unknown channel {channel}")));
        }
        state.actions.push(PlatformAction::DeletedChannel { channel });
        Ok(())
    }

    async fn grant_role(&self, user: UserId, role: RoleId, _reason: &str) -> PlatformResult<()> {
        let delay = self.state.lock().faults.role_grant_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if state.faults.forbidden_roles.contains(&role) {
            return Err(PlatformError::Forbidden(format!("cannot manage role {role}")));
        }
        let member = state
            .members
            .get_mut(&user)
            .ok_or_else(|| PlatformError::NotFound(format!("unknown member {user}")))?;
        if !member.roles.contains(&role) {
            member.roles.push(role);
        }
        state.actions.push(PlatformAction::GrantedRole { user, role });
        Ok(())
    }

    async fn revoke_role(&self, user: UserId, role: RoleId, _reason: &str) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.faults.forbidden_roles.contains(&role) {
            return Err(PlatformError::Forbidden(format!("cannot manage role {role}")));
        }
        let member = state
            .members
            .get_mut(&user)
            .ok_or_else(|| PlatformError::NotFound(format!("unknown member {user}")))?;
        member.roles.retain(|r| *r != role);
        state.actions.push(PlatformAction::RevokedRole { user, role });
        Ok(())
    }

    async fn remove_member(&self, user: UserId, _reason: &str) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.members.remove(&user).is_none() {
            return Err(PlatformError::NotFound(format!("unknown member {user}")));
        }
        state.actions.push(PlatformAction::RemovedMember { user });
        Ok(())
    }

    async fn ban_member(&self, user: UserId, _reason: &str) -> PlatformResult<()> {
        let mut state = self.state.lock();
        state.members.remove(&user);
        state.bans.insert(user);
        state.actions.push(PlatformAction::Banned { user });
        Ok(())
    }

    async fn unban_member(&self, user: UserId, _reason: &str) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if !state.bans.remove(&user) {
            return Err(PlatformError::NotFound(format!("{user} is not banned")));
        }
        state.actions.push(PlatformAction::Unbanned { user });
        Ok(())
    }
}
