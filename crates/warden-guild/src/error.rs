//! Guild service error types
//!
//! Errors specific to anchor, ticket and moderation operations. Each converts
//! into `WardenError` so the router can log every failure the same way.

use thiserror::Error;
use warden_core::{ChannelId, PlatformError, UserId, WardenError};

/// Errors from anchor resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    /// The anchor channel cannot be read or written
    #[error("anchor '{name}' channel {channel} unavailable: {reason}")]
    ChannelUnavailable {
        /// Anchor name
        name: String,
        /// Configured channel
        channel: ChannelId,
        /// Platform answer
        reason: String,
    },
}

impl AnchorError {
    /// Create a channel unavailable error
    pub fn channel_unavailable(name: &str, channel: ChannelId, err: &PlatformError) -> Self {
        Self::ChannelUnavailable {
            name: name.to_string(),
            channel,
            reason: err.to_string(),
        }
    }
}

impl From<AnchorError> for WardenError {
    fn from(err: AnchorError) -> Self {
        WardenError::transient(err.to_string())
    }
}

/// Errors from ticket operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// Requester already owns an open ticket
    #[error("user {owner} already has ticket channel {channel}")]
    AlreadyOpen {
        /// Requester
        owner: UserId,
        /// Their open ticket channel
        channel: ChannelId,
    },

    /// Channel is not a registered ticket
    #[error("channel {0} is not a ticket channel")]
    NotATicketChannel(ChannelId),

    /// Actor is neither the owner nor staff
    #[error("user {actor} may not close ticket channel {channel}")]
    Forbidden {
        /// Acting user
        actor: UserId,
        /// Ticket channel
        channel: ChannelId,
    },

    /// Platform refused or failed the channel operation
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl From<TicketError> for WardenError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::AlreadyOpen { .. } => WardenError::already_exists(err.to_string()),
            TicketError::NotATicketChannel(_) => WardenError::not_found(err.to_string()),
            TicketError::Forbidden { .. } => WardenError::forbidden(err.to_string()),
            TicketError::Platform(e) => e.into(),
        }
    }
}

/// Errors from moderation commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModerationError {
    /// Duration is not `Nd`, `Nh` or `permanent`
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    /// Actor lacks the ban permission
    #[error("user {0} may not ban members")]
    MissingPermission(UserId),

    /// Platform refused or failed the call
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl From<ModerationError> for WardenError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::InvalidDuration(_) => WardenError::invalid(err.to_string()),
            ModerationError::MissingPermission(_) => WardenError::forbidden(err.to_string()),
            ModerationError::Platform(e) => e.into(),
        }
    }
}
