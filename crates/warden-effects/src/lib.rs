//! Warden Effects - Production Handlers
//!
//! Stateless implementations of the effect traits from `warden-core`:
//!
//! - `FilesystemAnchorStore`: one JSON file per anchor
//! - `MemoryAnchorStore`: process-local records
//! - `RealTimeHandler`: system clock and tokio sleeping
//! - `RealRandomHandler`: thread-local RNG
//!
//! **Layer Constraint**: mock handlers with fault injection belong in
//! `warden-testkit`.

pub mod random;
pub mod storage;
pub mod time;

pub use random::RealRandomHandler;
pub use storage::{FilesystemAnchorStore, MemoryAnchorStore};
pub use time::RealTimeHandler;
