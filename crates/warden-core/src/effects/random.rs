//! Randomness effects

use async_trait::async_trait;

/// Source of randomness
#[async_trait]
pub trait RandomEffects: Send + Sync {
    /// Uniformly distributed 64-bit value
    async fn random_u64(&self) -> u64;

    /// Uniform draw from `low..=high`
    ///
    /// The modulo bias over a 64-bit source is negligible for the small
    /// ranges Warden draws from.
    async fn random_range(&self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        let span = high.abs_diff(low) + 1;
        let offset = self.random_u64().await % span;
        low.wrapping_add(offset as i64)
    }

    /// Fair coin
    async fn random_bool(&self) -> bool {
        self.random_u64().await & 1 == 1
    }
}
