//! Time effect handler - production only
//!
//! Delegates to the system clock and tokio's timer. Under
//! `tokio::time::pause()` sleeps auto-advance, which is how the verification
//! deadline is exercised in tests.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use warden_core::effects::PhysicalTimeEffects;

/// Real time handler for production use
#[derive(Debug, Clone, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    async fn physical_time_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_physical_time_is_monotonic_enough() {
        let handler = RealTimeHandler::new();
        let t1 = handler.physical_time_ms().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let t2 = handler.physical_time_ms().await;
        assert!(t2 >= t1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_follows_tokio_clock() {
        let handler = RealTimeHandler::new();
        let start = tokio::time::Instant::now();
        handler.sleep_ms(120_000).await;
        assert!(start.elapsed() >= Duration::from_secs(120));
    }
}
