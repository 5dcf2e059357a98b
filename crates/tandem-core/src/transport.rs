//! Transport abstraction for connection delivery.
//!
//! The engine never performs I/O. It queries the transport for liveness and
//! group membership, and returns [`Action`]s that the driver hands back to the
//! transport via [`Transport::apply`].
//!
//! # Implementations
//!
//! - **`Registry`** (tandem-server): per-connection outbound channels over
//!   Tokio TCP
//! - **`RecordingTransport`** (tandem-harness): in-memory, records every
//!   delivered event for assertions
//!
//! # Delivery Semantics
//!
//! Emits are fire-and-forget. Delivering to a connection that has gone away
//! is silently dropped; the engine learns about the loss through its own
//! `on_disconnect` event, not through a delivery error.

use tandem_proto::ServerEvent;

use crate::ids::{ConnectionId, ConversationId};

/// Side effect requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send an event to one connection
    Emit {
        /// Recipient
        to: ConnectionId,
        /// Event to deliver
        event: ServerEvent,
    },

    /// Send an event to every member of a conversation group
    BroadcastToGroup {
        /// Group (named by its conversation)
        group: ConversationId,
        /// Event to deliver
        event: ServerEvent,
    },

    /// Add a connection to a conversation group
    JoinGroup {
        /// Connection to add
        connection: ConnectionId,
        /// Group to join
        group: ConversationId,
    },

    /// Forget a conversation group once its conversation has ended
    DisbandGroup {
        /// Group to remove
        group: ConversationId,
    },

    /// Send an event to every connected connection
    BroadcastAll {
        /// Event to deliver
        event: ServerEvent,
    },
}

/// Connection registry the engine runs against.
///
/// Queries take `&self`; delivery takes `&mut self` because joining a group
/// mutates membership.
pub trait Transport {
    /// Returns true if `connection` is still live
    fn is_connected(&self, connection: ConnectionId) -> bool;

    /// Number of live connections
    fn connected_count(&self) -> usize;

    /// Returns true if `connection` is a member of `group`
    fn is_member(&self, connection: ConnectionId, group: ConversationId) -> bool;

    /// Deliver `event` to one connection
    fn emit(&mut self, to: ConnectionId, event: ServerEvent);

    /// Deliver `event` to every member of `group`
    fn broadcast_to_group(&mut self, group: ConversationId, event: ServerEvent);

    /// Deliver `event` to every live connection
    fn broadcast(&mut self, event: ServerEvent);

    /// Add `connection` to `group`. Joining twice is a no-op.
    fn join_group(&mut self, connection: ConnectionId, group: ConversationId);

    /// Drop every membership of `group`. Unknown groups are ignored.
    fn disband_group(&mut self, group: ConversationId);

    /// Execute one engine action
    fn apply(&mut self, action: Action) {
        match action {
            Action::Emit { to, event } => self.emit(to, event),
            Action::BroadcastToGroup { group, event } => self.broadcast_to_group(group, event),
            Action::JoinGroup { connection, group } => self.join_group(connection, group),
            Action::DisbandGroup { group } => self.disband_group(group),
            Action::BroadcastAll { event } => self.broadcast(event),
        }
    }

    /// Execute actions in order
    fn apply_all(&mut self, actions: impl IntoIterator<Item = Action>)
    where
        Self: Sized,
    {
        for action in actions {
            self.apply(action);
        }
    }
}
