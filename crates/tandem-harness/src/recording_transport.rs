//! In-memory transport that records every delivered event.

use std::collections::{BTreeSet, HashMap};

use tandem_core::{ConnectionId, ConversationId, Transport};
use tandem_proto::ServerEvent;

/// Connection registry for simulations.
///
/// Deliveries to live connections are appended to per-connection inboxes in
/// order. Deliveries to connections that have gone away are dropped, matching
/// the fire-and-forget contract of the production registry. Inboxes survive
/// disconnects so oracles can inspect what a departed client saw.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    connected: BTreeSet<ConnectionId>,
    groups: HashMap<ConversationId, BTreeSet<ConnectionId>>,
    inboxes: HashMap<ConnectionId, Vec<ServerEvent>>,
    dropped: usize,
}

impl RecordingTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection.
    pub fn connect(&mut self, connection: ConnectionId) {
        self.connected.insert(connection);
        self.inboxes.entry(connection).or_default();
    }

    /// Unregister a connection and drop it from every group.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.connected.remove(&connection);
        for members in self.groups.values_mut() {
            members.remove(&connection);
        }
        self.groups.retain(|_, members| !members.is_empty());
    }

    /// Remove a single group membership, simulating a lost join.
    pub fn leave_group(&mut self, connection: ConnectionId, group: ConversationId) -> bool {
        self.groups.get_mut(&group).is_some_and(|members| members.remove(&connection))
    }

    /// Everything delivered to `connection`, oldest first
    pub fn inbox(&self, connection: ConnectionId) -> &[ServerEvent] {
        self.inboxes.get(&connection).map(Vec::as_slice).unwrap_or_default()
    }

    /// Drain the inbox of `connection`
    pub fn take_inbox(&mut self, connection: ConnectionId) -> Vec<ServerEvent> {
        self.inboxes.get_mut(&connection).map(std::mem::take).unwrap_or_default()
    }

    /// Members of `group`
    pub fn members(&self, group: ConversationId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.groups.get(&group).into_iter().flatten().copied()
    }

    /// Number of deliveries dropped because the recipient was gone
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn deliver(&mut self, to: ConnectionId, event: ServerEvent) {
        if self.connected.contains(&to) {
            self.inboxes.entry(to).or_default().push(event);
        } else {
            self.dropped += 1;
        }
    }
}

impl Transport for RecordingTransport {
    fn is_connected(&self, connection: ConnectionId) -> bool {
        self.connected.contains(&connection)
    }

    fn connected_count(&self) -> usize {
        self.connected.len()
    }

    fn is_member(&self, connection: ConnectionId, group: ConversationId) -> bool {
        self.groups.get(&group).is_some_and(|members| members.contains(&connection))
    }

    fn emit(&mut self, to: ConnectionId, event: ServerEvent) {
        self.deliver(to, event);
    }

    fn broadcast_to_group(&mut self, group: ConversationId, event: ServerEvent) {
        let members: Vec<_> = self.members(group).collect();
        for member in members {
            self.deliver(member, event.clone());
        }
    }

    fn broadcast(&mut self, event: ServerEvent) {
        let connected: Vec<_> = self.connected.iter().copied().collect();
        for connection in connected {
            self.deliver(connection, event.clone());
        }
    }

    fn join_group(&mut self, connection: ConnectionId, group: ConversationId) {
        if self.connected.contains(&connection) {
            self.groups.entry(group).or_default().insert(connection);
        }
    }

    fn disband_group(&mut self, group: ConversationId) {
        self.groups.remove(&group);
    }
}
