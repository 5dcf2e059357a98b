//! Fixed-window rate limiting.
//!
//! One mechanism serves two limiters:
//!
//! - **Messages**, keyed by [`ConnectionId`](crate::ConnectionId): `N` messages
//!   per window. Only the offending message is rejected; the connection stays
//!   open.
//! - **Connects**, keyed by remote address in the server: exceeding the window
//!   blocks the key for a fixed period.
//!
//! Windows reset lazily on the first check after they elapse. Entries are
//! dropped by [`WindowLimiter::prune`] once their window has elapsed and they
//! are not blocked, which bounds memory to recently active keys.

use std::{
    collections::HashMap,
    hash::Hash,
    time::{Duration, Instant},
};

use serde::Deserialize;

use crate::config::duration_secs;

/// Limiter parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per window
    pub max_requests: u32,
    /// Window length
    #[serde(with = "duration_secs")]
    pub window: Duration,
    /// Block period after the window is exceeded, `None` to only reject
    #[serde(default, with = "duration_secs::option")]
    pub block_for: Option<Duration>,
}

impl RateLimitConfig {
    /// Per-connection message limit: 10 messages per 10 seconds
    pub const MESSAGES: Self =
        Self { max_requests: 10, window: Duration::from_secs(10), block_for: None };

    /// Per-address connect limit: 30 per minute, then blocked for 5 minutes
    pub const CONNECTS: Self = Self {
        max_requests: 30,
        window: Duration::from_secs(60),
        block_for: Some(Duration::from_secs(300)),
    };
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::MESSAGES
    }
}

/// Outcome of [`WindowLimiter::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request counted and allowed
    Allowed {
        /// Requests left in the current window
        remaining: u32,
    },
    /// Request refused
    Limited {
        /// Time until the key may try again
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Returns true if the request was allowed
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
    blocked_until: Option<Instant>,
}

impl Window {
    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

/// Fixed-window counter per key.
#[derive(Debug)]
pub struct WindowLimiter<K> {
    config: RateLimitConfig,
    windows: HashMap<K, Window>,
}

impl<K: Eq + Hash> WindowLimiter<K> {
    /// Create an empty limiter
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, windows: HashMap::new() }
    }

    /// Limiter parameters
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request for `key` at `now`.
    ///
    /// Refused requests still count against the window, so a key hammering a
    /// full window does not get through by retrying.
    pub fn check(&mut self, key: K, now: Instant) -> RateDecision {
        let config = self.config;
        let window = self.windows.entry(key).or_insert(Window {
            count: 0,
            resets_at: now + config.window,
            blocked_until: None,
        });

        if let Some(until) = window.blocked_until {
            if now < until {
                return RateDecision::Limited { retry_after: until - now };
            }
            window.blocked_until = None;
        }

        if now >= window.resets_at {
            window.count = 0;
            window.resets_at = now + config.window;
        }

        window.count = window.count.saturating_add(1);

        if window.count > config.max_requests {
            return match config.block_for {
                Some(block) => {
                    window.blocked_until = Some(now + block);
                    RateDecision::Limited { retry_after: block }
                },
                None => RateDecision::Limited { retry_after: window.resets_at - now },
            };
        }

        RateDecision::Allowed { remaining: config.max_requests - window.count }
    }

    /// Forget `key`, e.g. when its connection closes
    pub fn remove(&mut self, key: &K) {
        self.windows.remove(key);
    }

    /// Drop entries whose window elapsed and that are not blocked.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| w.is_blocked(now) || now < w.resets_at);
        before - self.windows.len()
    }

    /// Number of tracked keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns true if no key is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop all state
    pub fn clear(&mut self) {
        self.windows.clear();
    }
}
