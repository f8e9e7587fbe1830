//! Warden Core - Interface Layer
//!
//! This crate defines the vocabulary shared by every Warden crate:
//!
//! - Identifiers: `GuildId`, `ChannelId`, `MessageId`, `UserId`, `RoleId`
//! - Inbound events delivered by the gateway (`GuildEvent`)
//! - Outbound message shapes (`OutgoingMessage`, `ChannelSpec`)
//! - Effect traits for every side-effecting capability the coordinator needs
//! - The unified `WardenError` taxonomy
//! - Startup configuration (`GuildConfig`)
//!
//! # Architecture
//!
//! This is the **Layer 1 (Interface)** crate. It contains no handlers and no
//! coordination logic:
//! - Production handlers live in `warden-effects`
//! - Coordination logic lives in `warden-guild`
//! - Mock handlers live in `warden-testkit`

pub mod config;
pub mod effects;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod messages;

pub use config::{AnchorConfig, AnchorsConfig, GuildConfig, VerificationConfig};
pub use errors::{PlatformError, Result, StorageError, WardenError};
pub use events::{Actor, GuildEvent, Interaction, Member, Permissions, ReactionEvent};
pub use identifiers::{ChannelId, GuildId, InteractionId, MessageId, RoleId, UserId};
pub use messages::{
    Button, ChannelSpec, Embed, Message, MessageRef, OutgoingMessage, OverwriteTarget,
    PermissionOverwrite,
};
