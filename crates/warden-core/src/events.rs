//! Inbound gateway events
//!
//! The transport that produces these is external; Warden only consumes their
//! shape. Delivery is at-least-once and unordered across subjects.

use crate::identifiers::{ChannelId, InteractionId, MessageId, RoleId, UserId};
use crate::messages::Message;
use serde::{Deserialize, Serialize};

/// Guild-level permissions relevant to Warden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    /// May ban members
    #[serde(default)]
    pub ban_members: bool,
}

/// A guild member (or a plain user in direct messages)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// User id
    pub user_id: UserId,
    /// Account name
    pub name: String,
    /// Non-human account
    #[serde(default)]
    pub bot: bool,
    /// Roles held in the guild
    #[serde(default)]
    pub roles: Vec<RoleId>,
    /// Resolved guild permissions
    #[serde(default)]
    pub permissions: Permissions,
}

impl Member {
    /// Human member with no roles
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            bot: false,
            roles: Vec::new(),
            permissions: Permissions::default(),
        }
    }

    /// Check role membership
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

/// The user performing an operation, with the capabilities needed to authorize it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Acting user
    pub user_id: UserId,
    /// Roles held by the actor
    pub roles: Vec<RoleId>,
    /// Guild permissions of the actor
    pub permissions: Permissions,
}

impl Actor {
    /// Check role membership
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

impl From<&Member> for Actor {
    fn from(member: &Member) -> Self {
        Self {
            user_id: member.user_id,
            roles: member.roles.clone(),
            permissions: member.permissions,
        }
    }
}

/// A reaction placed on or removed from a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// Message reacted to
    pub message_id: MessageId,
    /// Channel of the message
    pub channel_id: ChannelId,
    /// Reacting user
    pub user_id: UserId,
    /// Reaction symbol as rendered text (unicode emoji or `<:name:id>`)
    pub symbol: String,
    /// Reacting user is a non-human account
    #[serde(default)]
    pub user_is_bot: bool,
}

/// A button press on a message sent by the system user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Interaction id, used to answer ephemerally
    pub id: InteractionId,
    /// Button custom id
    pub custom_id: String,
    /// Channel of the message holding the button
    pub channel_id: ChannelId,
    /// Member who pressed the button
    pub member: Member,
}

/// Event delivered by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GuildEvent {
    /// A member joined the guild
    MemberJoined(Member),
    /// A member left (or was removed from) the guild
    MemberLeft(UserId),
    /// A user was banned
    MemberBanned(UserId),
    /// A user was unbanned
    MemberUnbanned(UserId),
    /// A message was posted in a guild channel or a direct-message channel
    MessageCreated(Message),
    /// A reaction was added
    ReactionAdded(ReactionEvent),
    /// A reaction was removed
    ReactionRemoved(ReactionEvent),
    /// A button was pressed
    InteractionCreated(Interaction),
}

impl GuildEvent {
    /// Short event name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MemberJoined(_) => "member_joined",
            Self::MemberLeft(_) => "member_left",
            Self::MemberBanned(_) => "member_banned",
            Self::MemberUnbanned(_) => "member_unbanned",
            Self::MessageCreated(_) => "message_created",
            Self::ReactionAdded(_) => "reaction_added",
            Self::ReactionRemoved(_) => "reaction_removed",
            Self::InteractionCreated(_) => "interaction_created",
        }
    }
}
