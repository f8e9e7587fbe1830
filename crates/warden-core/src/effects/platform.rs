//! Platform capabilities required by the coordinator
//!
//! These are the outbound actions Warden invokes against the chat platform.
//! The transport behind them is external; implementations must map the
//! platform's answers onto `PlatformError` so callers can tell a missing
//! target (`NotFound`) from a refusal (`Forbidden`) or a flaky call
//! (`Transient`).

use crate::errors::PlatformError;
use crate::identifiers::{ChannelId, InteractionId, MessageId, RoleId, UserId};
use crate::messages::{ChannelSpec, Message, MessageRef, OutgoingMessage};
use async_trait::async_trait;

/// Result of a platform call
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Outbound platform actions
///
/// Role grants and revocations are idempotent on the platform side: granting a
/// held role or revoking a missing one succeeds without change.
#[async_trait]
pub trait GuildPlatformEffects: Send + Sync {
    /// The system user's own id
    fn system_user(&self) -> UserId;

    /// Send a direct message, opening the DM channel if needed
    async fn send_direct_message(
        &self,
        user: UserId,
        message: OutgoingMessage,
    ) -> PlatformResult<MessageRef>;

    /// Post a message in a guild channel
    async fn send_channel_message(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> PlatformResult<MessageRef>;

    /// Answer a button press with a reply only the presser can see
    async fn respond_ephemeral(
        &self,
        interaction: InteractionId,
        content: &str,
    ) -> PlatformResult<()>;

    /// Fetch a single message by id
    async fn fetch_message(&self, channel: ChannelId, message: MessageId)
        -> PlatformResult<Message>;

    /// Most recent messages of a channel, newest first, at most `limit`
    async fn channel_history(&self, channel: ChannelId, limit: usize)
        -> PlatformResult<Vec<Message>>;

    /// React to a message as the system user
    async fn add_reaction(&self, message: MessageRef, symbol: &str) -> PlatformResult<()>;

    /// Remove every reaction from a message
    async fn clear_reactions(&self, message: MessageRef) -> PlatformResult<()>;

    /// Create a text channel with permission overwrites
    async fn create_text_channel(&self, spec: ChannelSpec) -> PlatformResult<ChannelId>;

    /// Delete a channel
    async fn delete_channel(&self, channel: ChannelId, reason: &str) -> PlatformResult<()>;

    /// Grant a role to a member
    async fn grant_role(&self, user: UserId, role: RoleId, reason: &str) -> PlatformResult<()>;

    /// Revoke a role from a member
    async fn revoke_role(&self, user: UserId, role: RoleId, reason: &str) -> PlatformResult<()>;

    /// Remove (kick) a member from the guild
    async fn remove_member(&self, user: UserId, reason: &str) -> PlatformResult<()>;

    /// Ban a user from the guild
    async fn ban_member(&self, user: UserId, reason: &str) -> PlatformResult<()>;

    /// Lift a ban
    async fn unban_member(&self, user: UserId, reason: &str) -> PlatformResult<()>;
}
