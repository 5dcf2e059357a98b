//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples engine logic from system resources
//! (time, randomness). This enables:
//!
//! - Deterministic Simulation: Turmoil provides a virtual clock and seeded RNG,
//!   allowing perfect bug reproduction.
//!
//! - Production Runtime: the server uses the real system clock and OS entropy
//!   without any code changes to the engine.
//!
//! # Design Philosophy: "The Hollow Shell"
//!
//! State machines in `tandem-core` are pure logic. They:
//!
//! - MUST NOT call `std::time::Instant::now()` or `tokio::time::sleep()`
//! - MUST NOT use `rand::thread_rng()` or system entropy directly
//! - MUST receive time as a `now` argument or through an `Environment`
//!
//! The environment is implemented twice:
//!
//! 1. `SimEnv` (tandem-harness): Turmoil's virtual time and seeded RNG
//! 2. `SystemEnv` (tandem-server): Real system clock and OS RNG
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async primitives.
///
/// Both implementations report time as [`std::time::Instant`]: Turmoil's
/// virtual clock converts into it, so the engine stores and compares a single
/// concrete type.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current monotonic time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls must return times >= previous calls.
    fn now(&self) -> Instant;

    /// Returns wall-clock time as milliseconds since the Unix epoch.
    ///
    /// Only used for timestamps shown to clients (`created_at`). Never used
    /// for timeout arithmetic, which goes through [`Environment::now`].
    fn unix_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// Driver-only. Engine logic schedules work through `tick(now)` instead.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Determinism during simulations: Given the same RNG seed, this produces
    ///   the same sequence of bytes
    /// - Unpredictability in production: Uses OS entropy
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Used for connection ids.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
