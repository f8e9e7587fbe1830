//! Effect traits
//!
//! Every side effect the coordinator performs goes through one of these
//! traits. Production handlers live in `warden-effects`; deterministic mocks
//! live in `warden-testkit`.

pub mod platform;
pub mod random;
pub mod storage;
pub mod time;

pub use platform::{GuildPlatformEffects, PlatformResult};
pub use random::RandomEffects;
pub use storage::{AnchorRecord, AnchorStoreEffects};
pub use time::PhysicalTimeEffects;
