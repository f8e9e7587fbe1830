//! Message and channel shapes exchanged with the platform

use crate::events::Member;
use crate::identifiers::{ChannelId, MessageId, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// A message as observed on the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id
    pub id: MessageId,
    /// Channel the message was posted in
    pub channel_id: ChannelId,
    /// Parent category of the channel, if any
    #[serde(default)]
    pub category_id: Option<ChannelId>,
    /// True for direct-message channels
    #[serde(default)]
    pub is_direct: bool,
    /// Author of the message
    pub author: Member,
    /// Plain text content
    #[serde(default)]
    pub content: String,
    /// Title of the first embed, if the message carries one
    #[serde(default)]
    pub embed_title: Option<String>,
}

impl Message {
    /// Reference to this message
    pub fn reference(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.id,
        }
    }
}

/// Address of a live message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Channel holding the message
    pub channel_id: ChannelId,
    /// Message id
    pub message_id: MessageId,
}

/// Embed attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Embed {
    /// Embed title
    pub title: String,
    /// Embed body
    pub description: String,
}

/// Persistent button attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Visible label
    pub label: String,
    /// Identifier reported back in `Interaction::custom_id`
    pub custom_id: String,
}

/// Message to be sent by the system user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Plain text content
    pub content: String,
    /// Optional embed
    pub embed: Option<Embed>,
    /// Buttons, rendered in a single row
    pub buttons: Vec<Button>,
}

impl OutgoingMessage {
    /// Plain text message
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Attach an embed
    pub fn with_embed(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.embed = Some(Embed {
            title: title.into(),
            description: description.into(),
        });
        self
    }

    /// Attach a button
    pub fn with_button(mut self, label: impl Into<String>, custom_id: impl Into<String>) -> Self {
        self.buttons.push(Button {
            label: label.into(),
            custom_id: custom_id.into(),
        });
        self
    }
}

impl From<&str> for OutgoingMessage {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

impl From<String> for OutgoingMessage {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

/// Subject of a permission overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverwriteTarget {
    /// The guild's default role (everyone)
    Everyone,
    /// A specific role
    Role(RoleId),
    /// A specific user
    User(UserId),
}

/// Channel permission overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    /// Who the overwrite applies to
    pub target: OverwriteTarget,
    /// Allow reading the channel
    pub view: bool,
    /// Allow posting in the channel
    pub send: bool,
}

impl PermissionOverwrite {
    /// Deny viewing entirely
    pub fn hidden(target: OverwriteTarget) -> Self {
        Self {
            target,
            view: false,
            send: false,
        }
    }

    /// Allow viewing and posting
    pub fn participant(target: OverwriteTarget) -> Self {
        Self {
            target,
            view: true,
            send: true,
        }
    }
}

/// Request to create a text channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Channel name
    pub name: String,
    /// Channel topic
    pub topic: String,
    /// Audit-log reason
    pub reason: String,
    /// Permission overwrites applied at creation
    pub overwrites: Vec<PermissionOverwrite>,
}
