//! Presence tracking.
//!
//! Every known connection is in exactly one of three states:
//!
//! ```text
//!           enqueue            pair
//!   Idle ───────────▶ Waiting ──────▶ Matched
//!    ▲                   ▲               │
//!    │                   └───────────────┘
//!    │                partner left / timeout
//!    └── partner left while not connected / find-new-partner
//! ```
//!
//! The tracker is updated in the same handler that changes queue or store
//! state. Any change marks it dirty, which the engine turns into a
//! `user-stats` broadcast.

use std::collections::HashMap;

use crate::ids::ConnectionId;

/// Pairing state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presence {
    /// Connected, neither queued nor matched
    Idle,
    /// In the waiting queue
    Waiting,
    /// In an active conversation
    Matched,
}

/// Presence of every known connection.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    states: HashMap<ConnectionId, Presence>,
    dirty: bool,
}

impl PresenceTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state of `connection`.
    ///
    /// Returns true if the state changed.
    pub fn set(&mut self, connection: ConnectionId, presence: Presence) -> bool {
        let changed = self.states.insert(connection, presence) != Some(presence);
        self.dirty |= changed;
        changed
    }

    /// Current state, `None` for unknown connections
    #[must_use]
    pub fn get(&self, connection: ConnectionId) -> Option<Presence> {
        self.states.get(&connection).copied()
    }

    /// Forget `connection`
    pub fn remove(&mut self, connection: ConnectionId) -> Option<Presence> {
        let removed = self.states.remove(&connection);
        self.dirty |= removed.is_some();
        removed
    }

    /// Number of connections in `presence`
    #[must_use]
    pub fn count(&self, presence: Presence) -> usize {
        self.states.values().filter(|p| **p == presence).count()
    }

    /// Number of waiting connections
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.count(Presence::Waiting)
    }

    /// Number of known connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if no connection is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Returns and resets the changed-since-last-call flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Forget every connection
    pub fn clear(&mut self) {
        self.dirty |= !self.states.is_empty();
        self.states.clear();
    }
}
