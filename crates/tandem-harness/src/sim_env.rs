//! Turmoil-based Environment implementation for deterministic testing.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tandem_core::env::Environment;

/// Wall-clock origin reported by [`SimEnv::unix_millis`] (2023-11-14).
pub const SIM_EPOCH_MILLIS: u64 = 1_700_000_000_000;

/// Simulation environment using Turmoil's virtual time and seeded RNG.
///
/// This implementation provides:
///
/// - **Virtual Time**: `now()` returns Turmoil's simulated time, which can be
///   advanced instantly via `sleep()` inside a simulation.
///
/// - **Virtual Wall Clock**: `unix_millis()` is [`SIM_EPOCH_MILLIS`] plus the
///   virtual time elapsed since the environment was created, so message
///   timestamps are reproducible too.
///
/// - **Seeded RNG**: `random_bytes()` uses ChaCha20Rng seeded with a fixed
///   value, so connection ids are identical across runs.
///
/// # Usage
///
/// Create `SimEnv` inside a Turmoil simulation (`sim.client(..)` or
/// `sim.host(..)`). Outside one, time falls back to the real clock.
#[derive(Clone)]
pub struct SimEnv {
    /// Seeded RNG for deterministic random bytes
    ///
    /// Wrapped in Arc<Mutex<>> so clones share one sequence.
    /// Note: Turmoil is single-threaded, so this Mutex will never block.
    rng: Arc<Mutex<ChaCha20Rng>>,
    started: Instant,
}

impl SimEnv {
    /// Create a new SimEnv with default seed (0)
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a new SimEnv with a specific seed
    ///
    /// Use this when you want to test different random scenarios while
    /// maintaining reproducibility.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            started: tokio::time::Instant::now().into(),
        }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into()
    }

    fn unix_millis(&self) -> u64 {
        let elapsed = self.now().saturating_duration_since(self.started);
        SIM_EPOCH_MILLIS + u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX - SIM_EPOCH_MILLIS)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_bytes(&self, dest: &mut [u8]) {
        self.rng
            .lock()
            .unwrap_or_else(|e| {
                // Turmoil is single threaded. The mutex can only be poisoned
                // if another thread panics while holding the lock.
                unreachable!("RNG mutex poisoned in single-threaded context: {}", e)
            })
            .fill_bytes(dest);
    }
}
