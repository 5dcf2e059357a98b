//! Waiting queue and matcher.
//!
//! Unmatched connections wait in strict arrival order; each match pass pairs
//! the two longest-waiting live entries first.
//!
//! ## Match Pass
//!
//! ```text
//! while queue.len() >= 2:
//!     a, b = pop two oldest
//!     dead entry?   -> drop it, put the live one back at the head, continue
//!     pair(a, b) ok -> emit `matched` to both, join both to the group
//!     pair failed   -> put still-valid entries back at the head, stop
//! ```
//!
//! Stopping on failure keeps a persistent conflict from turning the pass into
//! a tight retry loop; the next pass (on connect or on the re-match timer)
//! tries again.

use std::{
    collections::{HashSet, VecDeque},
    time::Instant,
};

use tandem_proto::{ServerEvent, events::server::Matched};
use tracing::{debug, info, warn};

use crate::{
    error::ChatError,
    ids::ConnectionId,
    presence::{Presence, PresenceTracker},
    store::{Conversation, Store},
    transport::{Action, Transport},
};

/// FIFO queue that never holds a connection twice.
#[derive(Debug, Default)]
pub struct WaitingQueue {
    order: VecDeque<ConnectionId>,
    members: HashSet<ConnectionId>,
}

impl WaitingQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail. Returns false if already queued.
    pub fn push_back(&mut self, connection: ConnectionId) -> bool {
        if !self.members.insert(connection) {
            return false;
        }
        self.order.push_back(connection);
        true
    }

    /// Insert at the head. Returns false if already queued.
    pub fn push_front(&mut self, connection: ConnectionId) -> bool {
        if !self.members.insert(connection) {
            return false;
        }
        self.order.push_front(connection);
        true
    }

    /// Remove the longest-waiting entry
    pub fn pop_front(&mut self) -> Option<ConnectionId> {
        let connection = self.order.pop_front()?;
        self.members.remove(&connection);
        Some(connection)
    }

    /// Remove `connection` wherever it is. Returns false if absent.
    pub fn remove(&mut self, connection: ConnectionId) -> bool {
        if !self.members.remove(&connection) {
            return false;
        }
        self.order.retain(|c| *c != connection);
        true
    }

    /// Returns true if `connection` is queued
    #[must_use]
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.members.contains(&connection)
    }

    /// Number of queued connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nobody is waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Queued connections, oldest first
    pub fn iter(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.order.iter().copied()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

/// Pairs waiting connections into conversations.
#[derive(Debug, Default)]
pub struct Matcher {
    queue: WaitingQueue,
}

impl Matcher {
    /// Create a matcher with an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The waiting queue
    #[must_use]
    pub fn queue(&self) -> &WaitingQueue {
        &self.queue
    }

    /// Queue `connection` for pairing.
    ///
    /// No-op if it is already queued or already in an active conversation.
    /// Otherwise it is appended, marked Waiting and told so.
    pub fn enqueue(
        &mut self,
        connection: ConnectionId,
        store: &mut Store,
        presence: &mut PresenceTracker,
    ) -> Vec<Action> {
        if self.queue.contains(connection) {
            debug!(connection = %connection, "already waiting");
            return Vec::new();
        }

        if let Some(conversation) = store.find_by_participant(connection) {
            debug!(
                connection = %connection,
                conversation = %conversation.id,
                "already matched, not queueing"
            );
            return Vec::new();
        }

        self.queue.push_back(connection);
        presence.set(connection, Presence::Waiting);

        debug!(connection = %connection, waiting = self.queue.len(), "queued");

        vec![Action::Emit { to: connection, event: ServerEvent::Waiting }]
    }

    /// Remove `connection` from the queue. Returns false if it was not queued.
    pub fn dequeue(&mut self, connection: ConnectionId) -> bool {
        self.queue.remove(connection)
    }

    /// Pair waiting connections until fewer than two remain or a pairing
    /// fails.
    pub fn attempt_match_all<T: Transport>(
        &mut self,
        store: &mut Store,
        presence: &mut PresenceTracker,
        transport: &T,
        now: Instant,
    ) -> Vec<Action> {
        let mut actions = Vec::new();

        while self.queue.len() >= 2 {
            let (Some(a), Some(b)) = (self.queue.pop_front(), self.queue.pop_front()) else {
                break;
            };

            match (transport.is_connected(a), transport.is_connected(b)) {
                (true, true) => {},
                (a_live, b_live) => {
                    for (connection, live) in [(b, b_live), (a, a_live)] {
                        if live {
                            self.queue.push_front(connection);
                        } else {
                            debug!(connection = %connection, "dropping dead queue entry");
                            presence.remove(connection);
                        }
                    }
                    continue;
                },
            }

            match Self::pair(a, b, store, presence, now) {
                Ok((conversation, pair_actions)) => {
                    info!(
                        conversation = %conversation.id,
                        first = %a,
                        second = %b,
                        "matched"
                    );
                    actions.extend(pair_actions);
                },
                Err((err, fail_actions)) => {
                    warn!(first = %a, second = %b, error = %err, "pairing failed");
                    actions.extend(fail_actions);

                    // Head insertion in reverse keeps a ahead of b.
                    for connection in [b, a] {
                        if store.find_by_participant(connection).is_some() {
                            presence.set(connection, Presence::Matched);
                        } else {
                            self.queue.push_front(connection);
                        }
                    }
                    break;
                },
            }
        }

        actions
    }

    /// Create a conversation for `a` and `b`.
    ///
    /// On success both are told about their partner, joined to the
    /// conversation group and marked Matched. On failure both receive a
    /// generic pairing error.
    pub fn pair(
        a: ConnectionId,
        b: ConnectionId,
        store: &mut Store,
        presence: &mut PresenceTracker,
        now: Instant,
    ) -> Result<(Conversation, Vec<Action>), (ChatError, Vec<Action>)> {
        let conversation = match store.create_conversation(&[a, b], now) {
            Ok(conversation) => conversation,
            Err(err) => {
                let notice = ServerEvent::error(err.user_message());
                let actions = vec![
                    Action::Emit { to: a, event: notice.clone() },
                    Action::Emit { to: b, event: notice },
                ];
                return Err((err, actions));
            },
        };

        let matched = |partner: ConnectionId| {
            ServerEvent::Matched(Matched {
                conversation_id: conversation.id.to_string(),
                partner_id: partner.to_string(),
            })
        };

        let actions = vec![
            Action::Emit { to: a, event: matched(b) },
            Action::Emit { to: b, event: matched(a) },
            Action::JoinGroup { connection: a, group: conversation.id },
            Action::JoinGroup { connection: b, group: conversation.id },
        ];

        presence.set(a, Presence::Matched);
        presence.set(b, Presence::Matched);

        Ok((conversation, actions))
    }

    /// Drop every queued entry
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Live;

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn setup(live: &[u64]) -> (Matcher, Store, PresenceTracker, Live) {
        let transport = Live::of(live);
        (Matcher::new(), Store::new(), PresenceTracker::new(), transport)
    }

    #[test]
    fn queue_rejects_duplicates() {
        let mut queue = WaitingQueue::new();
        assert!(queue.push_back(conn(1)));
        assert!(!queue.push_back(conn(1)));
        assert!(!queue.push_front(conn(1)));
        assert_eq!(queue.len(), 1);

        assert!(queue.remove(conn(1)));
        assert!(!queue.remove(conn(1)));
        assert!(queue.is_empty());
    }

    #[test]
    fn enqueue_emits_waiting_once() {
        let (mut matcher, mut store, mut presence, _) = setup(&[1]);

        let actions = matcher.enqueue(conn(1), &mut store, &mut presence);
        assert_eq!(actions, [Action::Emit { to: conn(1), event: ServerEvent::Waiting }]);
        assert_eq!(presence.get(conn(1)), Some(Presence::Waiting));

        assert!(matcher.enqueue(conn(1), &mut store, &mut presence).is_empty());
        assert_eq!(matcher.queue().len(), 1);
    }

    #[test]
    fn enqueue_skips_matched_connection() {
        let (mut matcher, mut store, mut presence, _) = setup(&[1, 2]);
        store.create_conversation(&[conn(1), conn(2)], Instant::now()).unwrap();

        assert!(matcher.enqueue(conn(1), &mut store, &mut presence).is_empty());
        assert!(matcher.queue().is_empty());
    }

    #[test]
    fn pairs_oldest_first_and_leaves_odd_one_waiting() {
        let (mut matcher, mut store, mut presence, transport) = setup(&[1, 2, 3]);
        for n in [1, 2, 3] {
            matcher.enqueue(conn(n), &mut store, &mut presence);
        }

        let actions =
            matcher.attempt_match_all(&mut store, &mut presence, &transport, Instant::now());

        let conversation = store.find_by_participant(conn(1)).expect("1 is matched");
        assert_eq!(conversation.participants, [conn(1), conn(2)]);
        assert_eq!(matcher.queue().iter().collect::<Vec<_>>(), [conn(3)]);
        assert_eq!(presence.get(conn(3)), Some(Presence::Waiting));
        assert_eq!(presence.get(conn(2)), Some(Presence::Matched));

        let joins = actions.iter().filter(|a| matches!(a, Action::JoinGroup { .. })).count();
        assert_eq!(joins, 2);
    }

    #[test]
    fn dead_entries_are_dropped_not_requeued() {
        let (mut matcher, mut store, mut presence, transport) = setup(&[2, 3]);
        for n in [1, 2, 3] {
            matcher.enqueue(conn(n), &mut store, &mut presence);
        }

        matcher.attempt_match_all(&mut store, &mut presence, &transport, Instant::now());

        assert!(matcher.queue().is_empty());
        assert_eq!(presence.get(conn(1)), None);
        let conversation = store.find_by_participant(conn(2)).expect("2 is matched");
        assert_eq!(conversation.partner_of(conn(2)), Some(conn(3)));
    }

    #[test]
    fn conflict_requeues_valid_entry_at_head_and_stops() {
        let (mut matcher, mut store, mut presence, transport) = setup(&[1, 2, 3, 4]);
        for n in [1, 2, 3, 4] {
            matcher.enqueue(conn(n), &mut store, &mut presence);
        }

        // 2 gets matched through another path while still queued.
        store.create_conversation(&[conn(2), conn(9)], Instant::now()).unwrap();

        let actions =
            matcher.attempt_match_all(&mut store, &mut presence, &transport, Instant::now());

        assert_eq!(matcher.queue().iter().collect::<Vec<_>>(), [conn(1), conn(3), conn(4)]);
        assert_eq!(presence.get(conn(2)), Some(Presence::Matched));

        let errors = actions
            .iter()
            .filter(|a| matches!(a, Action::Emit { event: ServerEvent::Error(_), .. }))
            .count();
        assert_eq!(errors, 2);
    }
}
