//! Support ticket registry
//!
//! Each user owns at most one open ticket: a private text channel visible to
//! the requester, the staff role and the system user. The registry keeps the
//! owner ↔ channel mapping as a bijection; every mutation for one owner runs
//! under that owner's lock.

use crate::error::TicketError;
use crate::keyed_lock::KeyedLocks;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use warden_core::effects::{GuildPlatformEffects, PhysicalTimeEffects};
use warden_core::{
    Actor, ChannelId, ChannelSpec, Member, OutgoingMessage, OverwriteTarget, PermissionOverwrite,
    RoleId, UserId,
};

/// Custom id of the "Create Ticket" button
pub const TICKET_BUTTON_ID: &str = "create_ticket_button";

/// An open ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Requesting user
    pub owner_id: UserId,
    /// Private ticket channel
    pub channel_id: ChannelId,
    /// Opening time
    pub created_at_ms: u64,
}

#[derive(Debug, Default)]
struct TicketIndex {
    by_owner: HashMap<UserId, Ticket>,
    by_channel: HashMap<ChannelId, UserId>,
}

impl TicketIndex {
    fn insert(&mut self, ticket: Ticket) {
        self.by_channel.insert(ticket.channel_id, ticket.owner_id);
        self.by_owner.insert(ticket.owner_id, ticket);
    }

    fn remove_owner(&mut self, owner: UserId) -> Option<Ticket> {
        let ticket = self.by_owner.remove(&owner)?;
        self.by_channel.remove(&ticket.channel_id);
        Some(ticket)
    }
}

/// Ticket registry
pub struct TicketRegistry {
    platform: Arc<dyn GuildPlatformEffects>,
    time: Arc<dyn PhysicalTimeEffects>,
    staff_role: RoleId,
    prefix: String,
    index: Mutex<TicketIndex>,
    locks: KeyedLocks<UserId>,
}

impl std::fmt::Debug for TicketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketRegistry")
            .field("staff_role", &self.staff_role)
            .field("open", &self.open_count())
            .finish_non_exhaustive()
    }
}

impl TicketRegistry {
    /// Create a new registry
    pub fn new(
        platform: Arc<dyn GuildPlatformEffects>,
        time: Arc<dyn PhysicalTimeEffects>,
        staff_role: RoleId,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            time,
            staff_role,
            prefix: prefix.into(),
            index: Mutex::new(TicketIndex::default()),
            locks: KeyedLocks::new(),
        }
    }

    /// Open a ticket for `requester`
    ///
    /// The check, the channel creation and the registration run under the
    /// requester's lock, so concurrent presses yield exactly one ticket.
    pub async fn open(&self, requester: &Member) -> Result<Ticket, TicketError> {
        let owner = requester.user_id;
        let _guard = self.locks.lock(owner).await;

        if let Some(existing) = self.ticket_for_owner(owner) {
            return Err(TicketError::AlreadyOpen {
                owner,
                channel: existing.channel_id,
            });
        }

        let spec = self.channel_spec(requester);
        let channel_id = self.platform.create_text_channel(spec).await?;
        let ticket = Ticket {
            owner_id: owner,
            channel_id,
            created_at_ms: self.time.physical_time_ms().await,
        };
        self.index.lock().insert(ticket.clone());
        tracing::info!(user = %owner, channel = %channel_id, "ticket opened");

        let greeting = format!(
            "Hello {}! A staff member will be with you shortly.\nTo close this ticket, type `{}close`.",
            owner.mention(),
            self.prefix
        );
        if let Err(e) = self
            .platform
            .send_channel_message(channel_id, OutgoingMessage::text(greeting))
            .await
        {
            tracing::warn!(channel = %channel_id, error = %e, "failed to greet ticket owner");
        }

        Ok(ticket)
    }

    /// Close the ticket held in `channel`
    ///
    /// Only the owner or a holder of the staff role may close. The mapping is
    /// removed before the channel deletion is requested; a deletion failure
    /// after that point is logged and the ticket stays closed.
    pub async fn close(&self, actor: &Actor, channel: ChannelId) -> Result<Ticket, TicketError> {
        let owner = self
            .owner_of(channel)
            .ok_or(TicketError::NotATicketChannel(channel))?;

        if actor.user_id != owner && !actor.has_role(self.staff_role) {
            return Err(TicketError::Forbidden {
                actor: actor.user_id,
                channel,
            });
        }

        let _guard = self.locks.lock(owner).await;
        let ticket = {
            let mut index = self.index.lock();
            let still_open = index
                .by_owner
                .get(&owner)
                .is_some_and(|t| t.channel_id == channel);
            if still_open {
                index.remove_owner(owner)
            } else {
                None
            }
        }
        .ok_or(TicketError::NotATicketChannel(channel))?;

        tracing::info!(user = %owner, channel = %channel, closed_by = %actor.user_id, "ticket closed");

        if let Err(e) = self
            .platform
            .send_channel_message(channel, OutgoingMessage::text("Closing ticket..."))
            .await
        {
            tracing::debug!(channel = %channel, error = %e, "could not announce ticket closure");
        }
        self.delete_channel(channel, "Ticket closed").await;

        Ok(ticket)
    }

    /// Auto-close the ticket of a departed user
    pub async fn on_member_departure(&self, user: UserId) -> Option<Ticket> {
        let _guard = self.locks.lock(user).await;
        let ticket = self.index.lock().remove_owner(user)?;

        tracing::info!(user = %user, channel = %ticket.channel_id, "owner left, closing ticket");
        self.delete_channel(ticket.channel_id, "Ticket owner left the guild")
            .await;
        Some(ticket)
    }

    /// Ticket owned by `owner`
    pub fn ticket_for_owner(&self, owner: UserId) -> Option<Ticket> {
        self.index.lock().by_owner.get(&owner).cloned()
    }

    /// Ticket held in `channel`
    pub fn ticket_for_channel(&self, channel: ChannelId) -> Option<Ticket> {
        let index = self.index.lock();
        index
            .by_channel
            .get(&channel)
            .and_then(|owner| index.by_owner.get(owner))
            .cloned()
    }

    /// Number of open tickets
    pub fn open_count(&self) -> usize {
        self.index.lock().by_owner.len()
    }

    fn owner_of(&self, channel: ChannelId) -> Option<UserId> {
        self.index.lock().by_channel.get(&channel).copied()
    }

    fn channel_spec(&self, requester: &Member) -> ChannelSpec {
        ChannelSpec {
            name: format!("ticket-{}", channel_slug(&requester.name)),
            topic: format!("Support ticket for {}", requester.user_id.mention()),
            reason: format!("Ticket opened by {}", requester.name),
            overwrites: vec![
                PermissionOverwrite::hidden(OverwriteTarget::Everyone),
                PermissionOverwrite::participant(OverwriteTarget::User(requester.user_id)),
                PermissionOverwrite::participant(OverwriteTarget::Role(self.staff_role)),
                PermissionOverwrite::participant(OverwriteTarget::User(self.platform.system_user())),
            ],
        }
    }

    async fn delete_channel(&self, channel: ChannelId, reason: &str) {
        match self.platform.delete_channel(channel, reason).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(channel = %channel, "ticket channel already deleted");
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "failed to delete ticket channel");
            }
        }
    }
}

/// Lowercase channel-safe rendering of a display name
fn channel_slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                Some(c.to_lowercase().next().unwrap_or(c))
            } else if c.is_whitespace() {
                Some('-')
            } else {
                None
            }
        })
        .collect();
    if slug.is_empty() {
        "user".to_string()
    } else {
        slug
    }
}
