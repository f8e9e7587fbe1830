//! Random effect handler
//!
//! Uses `rand::thread_rng()`; this is the layer where real randomness enters.

use async_trait::async_trait;
use rand::RngCore;
use warden_core::effects::RandomEffects;

/// Real random handler
#[derive(Debug, Clone, Default)]
pub struct RealRandomHandler;

impl RealRandomHandler {
    /// Create a new real random handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RandomEffects for RealRandomHandler {
    async fn random_u64(&self) -> u64 {
        rand::thread_rng().next_u64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_range_stays_in_bounds() {
        let handler = RealRandomHandler::new();
        for _ in 0..500 {
            let v = handler.random_range(1, 20).await;
            assert!((1..=20).contains(&v));
        }
    }
}
