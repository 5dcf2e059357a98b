//! Live connection registry.
//!
//! Maps each connection to the sending half of its outbound channel and
//! tracks conversation groups. Owned by the engine actor, so it needs no
//! locking.
//!
//! Delivery never waits: a full outbound channel means the client is not
//! reading, and the event is dropped rather than stalling every other
//! connection.

use std::collections::{HashMap, HashSet};

use tandem_core::{ConnectionId, ConversationId, Transport};
use tandem_proto::ServerEvent;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Events buffered per connection before delivery starts dropping
pub const OUTBOUND_CAPACITY: usize = 64;

/// [`Transport`] over per-connection Tokio channels.
#[derive(Debug, Default)]
pub struct Registry {
    outbound: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    groups: HashMap<ConversationId, HashSet<ConnectionId>>,
    dropped: u64,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection.
    ///
    /// Returns false, leaving the existing entry alone, if `connection` is
    /// already registered.
    pub fn register(
        &mut self,
        connection: ConnectionId,
        sender: mpsc::Sender<ServerEvent>,
    ) -> bool {
        if self.outbound.contains_key(&connection) {
            return false;
        }
        self.outbound.insert(connection, sender);
        true
    }

    /// Forget a connection and remove it from every group.
    ///
    /// Dropping the sender ends the connection's writer task once it has
    /// drained what is already queued.
    pub fn unregister(&mut self, connection: ConnectionId) {
        self.outbound.remove(&connection);
        self.groups.retain(|_, members| {
            members.remove(&connection);
            !members.is_empty()
        });
    }

    /// Number of events dropped because a channel was full or closed
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Number of groups with at least one member
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn deliver(&mut self, to: ConnectionId, event: ServerEvent) {
        let Some(sender) = self.outbound.get(&to) else {
            self.dropped += 1;
            return;
        };

        match sender.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(event)) => {
                self.dropped += 1;
                warn!(connection = %to, event = event.name(), "outbound queue full, dropping");
            },
            Err(TrySendError::Closed(event)) => {
                self.dropped += 1;
                debug!(connection = %to, event = event.name(), "writer gone, dropping");
            },
        }
    }
}

impl Transport for Registry {
    fn is_connected(&self, connection: ConnectionId) -> bool {
        self.outbound.contains_key(&connection)
    }

    fn connected_count(&self) -> usize {
        self.outbound.len()
    }

    fn is_member(&self, connection: ConnectionId, group: ConversationId) -> bool {
        self.groups.get(&group).is_some_and(|members| members.contains(&connection))
    }

    fn emit(&mut self, to: ConnectionId, event: ServerEvent) {
        self.deliver(to, event);
    }

    fn broadcast_to_group(&mut self, group: ConversationId, event: ServerEvent) {
        let members: Vec<_> =
            self.groups.get(&group).map(|m| m.iter().copied().collect()).unwrap_or_default();
        for member in members {
            self.deliver(member, event.clone());
        }
    }

    fn broadcast(&mut self, event: ServerEvent) {
        let connections: Vec<_> = self.outbound.keys().copied().collect();
        for connection in connections {
            self.deliver(connection, event.clone());
        }
    }

    fn join_group(&mut self, connection: ConnectionId, group: ConversationId) {
        if self.outbound.contains_key(&connection) {
            self.groups.entry(group).or_default().insert(connection);
        }
    }

    fn disband_group(&mut self, group: ConversationId) {
        self.groups.remove(&group);
    }
}

#[cfg(test)]
mod tests {
    use tandem_core::Action;

    use super::*;

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn registered(registry: &mut Registry, n: u64) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        assert!(registry.register(conn(n), tx));
        rx
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let mut registry = Registry::new();
        let _rx = registered(&mut registry, 1);

        let (tx, _) = mpsc::channel(1);
        assert!(!registry.register(conn(1), tx));
        assert_eq!(registry.connected_count(), 1);
    }

    #[test]
    fn group_broadcast_reaches_members_only() {
        let mut registry = Registry::new();
        let mut a = registered(&mut registry, 1);
        let mut b = registered(&mut registry, 2);
        let mut c = registered(&mut registry, 3);
        let group = ConversationId::new(1);

        registry.join_group(conn(1), group);
        registry.join_group(conn(2), group);
        registry.broadcast_to_group(group, ServerEvent::PartnerDisconnected);

        assert_eq!(a.try_recv().ok(), Some(ServerEvent::PartnerDisconnected));
        assert_eq!(b.try_recv().ok(), Some(ServerEvent::PartnerDisconnected));
        assert!(c.try_recv().is_err());
    }

    #[test]
    fn unregister_leaves_groups() {
        let mut registry = Registry::new();
        let _a = registered(&mut registry, 1);
        let _b = registered(&mut registry, 2);
        let group = ConversationId::new(7);
        registry.join_group(conn(1), group);
        registry.join_group(conn(2), group);

        registry.unregister(conn(1));
        assert!(!registry.is_connected(conn(1)));
        assert!(!registry.is_member(conn(1), group));
        assert!(registry.is_member(conn(2), group));

        registry.unregister(conn(2));
        assert_eq!(registry.group_count(), 0);
    }

    #[test]
    fn ended_conversations_do_not_pile_up_groups() {
        let mut registry = Registry::new();
        let _a = registered(&mut registry, 1);
        let _b = registered(&mut registry, 2);

        for raw in 1..=5 {
            let group = ConversationId::new(raw);
            registry.apply_all([
                Action::JoinGroup { connection: conn(1), group },
                Action::JoinGroup { connection: conn(2), group },
                Action::DisbandGroup { group },
            ]);
        }
        assert_eq!(registry.group_count(), 0);

        registry.disband_group(ConversationId::new(99));
        assert!(registry.is_connected(conn(1)));
    }

    #[test]
    fn unknown_connection_cannot_join() {
        let mut registry = Registry::new();
        registry.join_group(conn(9), ConversationId::new(1));
        assert_eq!(registry.group_count(), 0);
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let mut registry = Registry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.register(conn(1), tx);

        registry.emit(conn(1), ServerEvent::Waiting);
        registry.emit(conn(1), ServerEvent::PartnerDisconnected);

        assert_eq!(registry.dropped(), 1);
        assert_eq!(rx.try_recv().ok(), Some(ServerEvent::Waiting));
    }

    #[test]
    fn closed_or_unknown_recipient_is_dropped() {
        let mut registry = Registry::new();
        let rx = registered(&mut registry, 1);
        drop(rx);

        registry.emit(conn(1), ServerEvent::Waiting);
        registry.emit(conn(2), ServerEvent::Waiting);
        assert_eq!(registry.dropped(), 2);
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let mut registry = Registry::new();
        let mut receivers: Vec<_> = (1..=3).map(|n| registered(&mut registry, n)).collect();

        registry.broadcast(ServerEvent::error("maintenance"));
        for rx in &mut receivers {
            assert_eq!(rx.try_recv().ok(), Some(ServerEvent::error("maintenance")));
        }
    }
}
