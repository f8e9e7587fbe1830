//! Physical time effects

use async_trait::async_trait;

/// Wall-clock reads and sleeping
///
/// Deadlines are computed from `physical_time_ms` and waited on through
/// `sleep_ms`, so a paused or simulated clock drives every timeout.
#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    /// Milliseconds since the Unix epoch
    async fn physical_time_ms(&self) -> u64;

    /// Suspend the current task for `ms` milliseconds
    async fn sleep_ms(&self, ms: u64);
}
