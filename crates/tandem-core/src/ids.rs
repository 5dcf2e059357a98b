//! Strongly typed identifiers.
//!
//! All ids render as fixed-width lowercase hex so they sort the same way as
//! strings and as numbers. The rendering of a [`ConversationId`] doubles as the
//! transport group name of that conversation.

use std::fmt;

use crate::env::Environment;

/// Ephemeral identifier of one live client connection.
///
/// Assigned by the driver when the connection is accepted. Carries no identity
/// beyond the life of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Draw a fresh id from the environment RNG
    pub fn random<E: Environment>(env: &E) -> Self {
        Self(env.random_u64())
    }

    /// Raw value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Conversation identifier.
///
/// Allocated from a monotonic counter by the store, so ids order by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(u64);

impl ConversationId {
    /// Wrap a raw id
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Parse the hex rendering produced by `Display`.
    ///
    /// Returns `None` for anything that is not exactly 16 hex digits.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(s, 16).ok().map(Self)
    }

    /// Transport group name for this conversation
    #[must_use]
    pub fn group(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Message identifier, monotonic per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    /// Wrap a raw id
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
