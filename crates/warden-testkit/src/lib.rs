//! Warden Testkit - Test Doubles
//!
//! - `MockPlatform`: an in-memory guild implementing `GuildPlatformEffects`,
//!   recording every outbound action and supporting fault injection
//! - `SeededRandom` / `ScriptedRandom`: deterministic `RandomEffects`
//! - `fixtures`: members, messages and configuration used across tests
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` for mock state: no lock is held across an
//! `.await`, and a synchronous API keeps assertions terse.

pub mod fixtures;
pub mod platform;
pub mod random;

pub use fixtures::{init_test_tracing, test_config, test_member, test_staff};
pub use platform::{MockPlatform, PlatformAction};
pub use random::{ScriptedRandom, SeededRandom};
