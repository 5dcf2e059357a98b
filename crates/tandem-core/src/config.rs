//! Engine configuration.
//!
//! All durations are expressed in whole seconds when deserialized. The
//! server builds an [`EngineConfig`] from command-line flags; tests use
//! [`EngineConfig::default`] and override single fields.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::{rate_limiter::RateLimitConfig, reaper::ReaperConfig};

/// Serde helpers for durations stored as whole seconds.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    /// Deserialize a `u64` number of seconds
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }

    /// Same for optional durations
    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer};

        /// Deserialize an optional `u64` number of seconds
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(d).map(|secs| secs.map(Duration::from_secs))
        }
    }
}

/// Rejected configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An interval that drives a timer is zero
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    /// Reaper would poll less often than conversations expire
    #[error("reaper poll interval {poll:?} exceeds idle timeout {idle:?}")]
    PollExceedsTimeout {
        /// Configured poll interval
        poll: Duration,
        /// Configured idle timeout
        idle: Duration,
    },

    /// A rate limit that allows nothing
    #[error("message rate limit must allow at least one message")]
    ZeroRateLimit,
}

/// Timers and limits of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Idle conversation sweep
    pub reaper: ReaperConfig,
    /// Per-connection message limit
    pub message_rate: RateLimitConfig,
    /// Period of the `user-stats` broadcast
    #[serde(with = "duration_secs")]
    pub stats_interval: Duration,
    /// Period of the re-match sweep over the waiting queue
    #[serde(with = "duration_secs")]
    pub rematch_interval: Duration,
    /// Period of rate limiter pruning
    #[serde(with = "duration_secs")]
    pub prune_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reaper: ReaperConfig::default(),
            message_rate: RateLimitConfig::MESSAGES,
            stats_interval: Duration::from_secs(10),
            rematch_interval: Duration::from_secs(5),
            prune_interval: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Check the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for zero intervals, a zero message limit, or a
    /// reaper poll interval longer than the idle timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("idle timeout", self.reaper.idle_timeout),
            ("reaper poll interval", self.reaper.poll_interval),
            ("message rate window", self.message_rate.window),
            ("stats interval", self.stats_interval),
            ("rematch interval", self.rematch_interval),
            ("prune interval", self.prune_interval),
        ];
        if let Some((name, _)) = intervals.into_iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::ZeroInterval(name));
        }

        if self.reaper.poll_interval > self.reaper.idle_timeout {
            return Err(ConfigError::PollExceedsTimeout {
                poll: self.reaper.poll_interval,
                idle: self.reaper.idle_timeout,
            });
        }

        if self.message_rate.max_requests == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }

        Ok(())
    }
}
