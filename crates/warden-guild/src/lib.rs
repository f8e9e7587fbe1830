//! Warden Guild - Feature Layer
//!
//! Stateful coordination for one guild, correct under concurrent, unordered,
//! at-least-once event delivery:
//!
//! - **Anchors** (`AnchorResolver`): recover well-known control messages by
//!   stored id, then by history scan, then by creating a new one
//! - **Tickets** (`TicketRegistry`): at most one private support channel per user
//! - **Verification** (`VerificationService`): arithmetic challenge over DM
//!   with a deadline
//! - **Role sync** (`RoleSyncEngine`): reactions on the role anchor grant and
//!   revoke roles
//! - **Moderation** (`ModerationService`): timed bans and vote reactions
//! - **Routing** (`GuildRouter`): dispatches gateway events to all of the above
//!
//! # Architecture
//!
//! This is a **Layer 5 (Feature)** crate. Every side effect goes through the
//! effect traits in `warden-core`; services hold them as trait objects so
//! production handlers and `warden-testkit` mocks are interchangeable.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex`/`RwLock` for session tables and ticket indexes:
//! these sections are short and never held across an `.await`. Work that
//! must be serialized across awaits uses `KeyedLocks`.

pub mod anchor;
pub mod commands;
pub mod error;
pub mod keyed_lock;
pub mod moderation;
pub mod role_sync;
pub mod router;
pub mod services;
pub mod task_registry;
pub mod ticket;
pub mod verification;

pub use anchor::{AnchorResolver, AnchorSpec, RecognitionRule, ResolutionPath, HISTORY_SCAN_WINDOW};
pub use commands::{Command, CommandError};
pub use error::{AnchorError, ModerationError, TicketError};
pub use keyed_lock::KeyedLocks;
pub use moderation::{BanDuration, BanRecord, ModerationService, VOTE_REACTIONS};
pub use role_sync::{IgnoreReason, RoleReactionMap, RoleSyncEngine, RoleSyncOutcome};
pub use router::{GuildRouter, StartupReport};
pub use services::{GuildEffects, GuildServices, ROLE_ANCHOR, TICKET_ANCHOR};
pub use task_registry::TaskRegistry;
pub use ticket::{Ticket, TicketRegistry, TICKET_BUTTON_ID};
pub use verification::{
    Operator, Question, RejectReason, SessionHandle, VerificationOutcome, VerificationService,
    VerificationStats,
};
