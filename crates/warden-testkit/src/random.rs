//! Deterministic randomness

use async_trait::async_trait;
use parking_lot::Mutex;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use warden_core::effects::RandomEffects;

/// Seeded ChaCha20 source for reproducible draws
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SeededRandom {
    /// Fixed seed
    pub fn deterministic() -> Self {
        Self::with_seed(42)
    }

    /// Specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }
}

#[async_trait]
impl RandomEffects for SeededRandom {
    async fn random_u64(&self) -> u64 {
        self.rng.lock().next_u64()
    }
}

/// Replays a fixed script of raw values, then repeats the last one
///
/// `random_range(low, high)` maps a raw value `v` to `low + v % span`, so a
/// script of `[6, 4, 1]` draws `7`, `5` and `true` from `1..=20` ranges and a
/// coin flip.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    script: Arc<Mutex<VecDeque<u64>>>,
    last: Arc<Mutex<u64>>,
}

impl ScriptedRandom {
    /// Script of raw values
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: Arc::new(Mutex::new(values.into_iter().collect())),
            last: Arc::new(Mutex::new(0)),
        }
    }
}

#[async_trait]
impl RandomEffects for ScriptedRandom {
    async fn random_u64(&self) -> u64 {
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        if let Some(value) = next {
            *last = value;
        }
        *last
    }
}
