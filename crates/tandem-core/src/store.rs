//! Conversation and message store.
//!
//! Single source of truth for who is paired with whom. Three structures are
//! mutated together and must never be observed half-updated:
//!
//! ```text
//! conversations: ConversationId -> Conversation   (records, never deleted)
//! participants:  ConnectionId   -> ConversationId (active conversations only)
//! messages:      ConversationId -> Vec<Message>   (active conversations only)
//! ```
//!
//! The store is a plain owned value with `&mut self` mutators. Serialization
//! of concurrent events is the owner's job (see [`Engine`](crate::Engine)).
//!
//! # Invariants
//!
//! - A connection is indexed to at most one active conversation.
//! - A conversation has exactly two distinct participants, fixed at creation.
//! - Ending a conversation unindexes both participants and purges its
//!   messages; the record stays, marked inactive, for statistics.
//! - Every buffered message was sent by a participant of its conversation.

use std::{
    collections::{BTreeMap, HashMap},
    time::Instant,
};

use tracing::debug;

use crate::{
    error::{ChatError, ValidationError},
    ids::{ConnectionId, ConversationId, MessageId},
};

/// A pairing of exactly two connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversation {
    /// Conversation id
    pub id: ConversationId,
    /// The two participants, in match order
    pub participants: [ConnectionId; 2],
    /// False once ended
    pub is_active: bool,
    /// Creation time
    pub created_at: Instant,
    /// Time of the last saved message (or creation)
    pub last_activity: Instant,
}

impl Conversation {
    /// Returns true if `connection` is one of the two participants
    #[must_use]
    pub fn has_participant(&self, connection: ConnectionId) -> bool {
        self.participants.contains(&connection)
    }

    /// The other participant, `None` if `connection` is not a participant
    #[must_use]
    pub fn partner_of(&self, connection: ConnectionId) -> Option<ConnectionId> {
        match self.participants {
            [a, b] if a == connection => Some(b),
            [a, b] if b == connection => Some(a),
            _ => None,
        }
    }
}

/// A message buffered for an active conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message id
    pub id: MessageId,
    /// Owning conversation
    pub conversation_id: ConversationId,
    /// Sending participant
    pub sender: ConnectionId,
    /// Sanitized content
    pub content: String,
    /// Time the message was saved
    pub created_at: Instant,
}

/// Aggregate counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Conversations ever created (active and ended)
    pub total_conversations: usize,
    /// Conversations still active
    pub active_conversations: usize,
    /// Messages buffered across active conversations
    pub buffered_messages: usize,
    /// Connections indexed to an active conversation
    pub active_participants: usize,
}

/// In-memory conversation store.
#[derive(Debug, Default)]
pub struct Store {
    /// Ordered by id, which is creation order
    conversations: BTreeMap<ConversationId, Conversation>,
    participants: HashMap<ConnectionId, ConversationId>,
    messages: HashMap<ConversationId, Vec<Message>>,
    next_conversation: u64,
    next_message: u64,
}

impl Store {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation between exactly two unmatched connections.
    ///
    /// # Errors
    ///
    /// - `ValidationError::ParticipantCount` unless exactly two ids are given
    /// - `ValidationError::DuplicateParticipant` if both ids are equal
    /// - `ChatError::Conflict` if either id is already in an active
    ///   conversation
    pub fn create_conversation(
        &mut self,
        participants: &[ConnectionId],
        now: Instant,
    ) -> Result<Conversation, ChatError> {
        let &[a, b] = participants else {
            return Err(ValidationError::ParticipantCount(participants.len()).into());
        };

        if a == b {
            return Err(ValidationError::DuplicateParticipant(a).into());
        }

        for connection in [a, b] {
            if let Some(existing) = self.find_by_participant(connection) {
                return Err(ChatError::Conflict { connection, conversation: existing.id });
            }
        }

        self.next_conversation += 1;
        let id = ConversationId::new(self.next_conversation);

        let conversation = Conversation {
            id,
            participants: [a, b],
            is_active: true,
            created_at: now,
            last_activity: now,
        };

        self.conversations.insert(id, conversation);
        self.participants.insert(a, id);
        self.participants.insert(b, id);
        self.messages.insert(id, Vec::new());

        debug!(conversation = %id, first = %a, second = %b, "conversation created");

        Ok(conversation)
    }

    /// Look up a conversation by id, active or not
    #[must_use]
    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.get(&id)
    }

    /// Active conversation of `connection`.
    ///
    /// An index entry pointing at an inactive or unknown conversation is
    /// pruned and treated as absent.
    pub fn find_by_participant(&mut self, connection: ConnectionId) -> Option<Conversation> {
        let id = *self.participants.get(&connection)?;

        match self.conversations.get(&id) {
            Some(conversation) if conversation.is_active => Some(*conversation),
            _ => {
                debug!(connection = %connection, conversation = %id, "pruning stale index entry");
                self.participants.remove(&connection);
                None
            },
        }
    }

    /// Append a message and bump the conversation's activity time.
    ///
    /// # Errors
    ///
    /// - `ChatError::ConversationNotFound` for an unknown id
    /// - `ChatError::Inactive` if the conversation ended
    /// - `ChatError::NotParticipant` if `sender` is not a participant
    pub fn save_message(
        &mut self,
        conversation_id: ConversationId,
        sender: ConnectionId,
        content: String,
        now: Instant,
    ) -> Result<Message, ChatError> {
        let conversation = self
            .conversations
            .get_mut(&conversation_id)
            .ok_or(ChatError::ConversationNotFound(conversation_id))?;

        if !conversation.is_active {
            return Err(ChatError::Inactive(conversation_id));
        }

        if !conversation.has_participant(sender) {
            return Err(ChatError::NotParticipant { sender, conversation: conversation_id });
        }

        conversation.last_activity = now;

        self.next_message += 1;
        let message = Message {
            id: MessageId::new(self.next_message),
            conversation_id,
            sender,
            content,
            created_at: now,
        };

        self.messages.entry(conversation_id).or_default().push(message.clone());

        Ok(message)
    }

    /// Buffered messages in insertion order, empty if unknown or ended
    #[must_use]
    pub fn list_messages(&self, conversation_id: ConversationId) -> &[Message] {
        self.messages.get(&conversation_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Mark a conversation active at `now` without saving a message.
    ///
    /// Returns false if the conversation is unknown or ended.
    pub fn update_activity(&mut self, conversation_id: ConversationId, now: Instant) -> bool {
        match self.conversations.get_mut(&conversation_id) {
            Some(conversation) if conversation.is_active => {
                conversation.last_activity = now;
                true
            },
            _ => false,
        }
    }

    /// End a conversation.
    ///
    /// Idempotent. Returns false only if the id is unknown. Both participants
    /// are unindexed and the message buffer is discarded; the record is kept.
    pub fn end_conversation(&mut self, conversation_id: ConversationId) -> bool {
        let Some(conversation) = self.conversations.get_mut(&conversation_id) else {
            return false;
        };

        let was_active = conversation.is_active;
        conversation.is_active = false;

        for participant in conversation.participants {
            if self.participants.get(&participant) == Some(&conversation_id) {
                self.participants.remove(&participant);
            }
        }

        let purged = self.messages.remove(&conversation_id).map_or(0, |m| m.len());

        if was_active {
            debug!(conversation = %conversation_id, purged, "conversation ended");
        }

        debug_assert!(!self.participants.values().any(|id| *id == conversation_id));

        true
    }

    /// Active conversations whose last activity is strictly before
    /// `threshold`, in creation order
    #[must_use]
    pub fn find_idle(&self, threshold: Instant) -> Vec<Conversation> {
        self.conversations
            .values()
            .filter(|c| c.is_active && c.last_activity < threshold)
            .copied()
            .collect()
    }

    /// Aggregate counts
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_conversations: self.conversations.len(),
            active_conversations: self.conversations.values().filter(|c| c.is_active).count(),
            buffered_messages: self.messages.values().map(Vec::len).sum(),
            active_participants: self.participants.len(),
        }
    }

    /// Drop all conversations, index entries and messages
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.participants.clear();
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ids() -> (ConnectionId, ConnectionId, ConnectionId) {
        (ConnectionId::new(1), ConnectionId::new(2), ConnectionId::new(3))
    }

    #[test]
    fn create_indexes_both_participants() {
        let mut store = Store::new();
        let (a, b, _) = ids();
        let now = Instant::now();

        let conversation = store.create_conversation(&[a, b], now).unwrap();

        assert!(conversation.is_active);
        assert_eq!(conversation.created_at, conversation.last_activity);
        assert_eq!(store.find_by_participant(a), Some(conversation));
        assert_eq!(store.find_by_participant(b), Some(conversation));
        assert_eq!(conversation.partner_of(a), Some(b));
    }

    #[test]
    fn wrong_participant_count_is_validation_error() {
        let mut store = Store::new();
        let (a, b, c) = ids();
        let now = Instant::now();

        for set in [&[a][..], &[a, b, c][..], &[][..]] {
            let err = store.create_conversation(set, now).unwrap_err();
            assert_eq!(err, ChatError::Validation(ValidationError::ParticipantCount(set.len())));
        }

        assert_eq!(
            store.create_conversation(&[a, a], now),
            Err(ChatError::Validation(ValidationError::DuplicateParticipant(a)))
        );
    }

    #[test]
    fn matched_participant_conflicts() {
        let mut store = Store::new();
        let (a, b, c) = ids();
        let now = Instant::now();

        let first = store.create_conversation(&[a, b], now).unwrap();
        assert_eq!(
            store.create_conversation(&[c, b], now),
            Err(ChatError::Conflict { connection: b, conversation: first.id })
        );
        assert_eq!(store.stats().total_conversations, 1);
    }

    #[test]
    fn ending_frees_participants_for_rematch() {
        let mut store = Store::new();
        let (a, b, _) = ids();
        let now = Instant::now();

        let first = store.create_conversation(&[a, b], now).unwrap();
        assert!(store.end_conversation(first.id));

        assert_eq!(store.find_by_participant(a), None);
        assert_eq!(store.find_by_participant(b), None);

        let second = store.create_conversation(&[a, b], now).unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.id > first.id);
    }

    #[test]
    fn end_is_idempotent() {
        let mut store = Store::new();
        let (a, b, _) = ids();

        let conversation = store.create_conversation(&[a, b], Instant::now()).unwrap();
        assert!(store.end_conversation(conversation.id));
        assert!(store.end_conversation(conversation.id));
        assert!(!store.end_conversation(ConversationId::new(999)));
    }

    #[test]
    fn save_message_checks_state_and_sender() {
        let mut store = Store::new();
        let (a, b, c) = ids();
        let now = Instant::now();

        let conversation = store.create_conversation(&[a, b], now).unwrap();

        assert_eq!(
            store.save_message(conversation.id, c, "hi".into(), now),
            Err(ChatError::NotParticipant { sender: c, conversation: conversation.id })
        );

        store.end_conversation(conversation.id);
        assert_eq!(
            store.save_message(conversation.id, a, "hi".into(), now),
            Err(ChatError::Inactive(conversation.id))
        );

        let unknown = ConversationId::new(42);
        assert_eq!(
            store.save_message(unknown, a, "hi".into(), now),
            Err(ChatError::ConversationNotFound(unknown))
        );
    }

    #[test]
    fn messages_keep_insertion_order_and_purge_on_end() {
        let mut store = Store::new();
        let (a, b, _) = ids();
        let t0 = Instant::now();

        let conversation = store.create_conversation(&[a, b], t0).unwrap();
        for (i, sender) in [a, b, a].into_iter().enumerate() {
            let at = t0 + Duration::from_secs(i as u64);
            store.save_message(conversation.id, sender, format!("m{i}"), at).unwrap();
        }

        let contents: Vec<_> =
            store.list_messages(conversation.id).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m0", "m1", "m2"]);
        assert_eq!(store.get(conversation.id).unwrap().last_activity, t0 + Duration::from_secs(2));

        store.end_conversation(conversation.id);
        assert!(store.list_messages(conversation.id).is_empty());

        let stats = store.stats();
        assert_eq!(stats.total_conversations, 1);
        assert_eq!(stats.active_conversations, 0);
        assert_eq!(stats.buffered_messages, 0);
        assert_eq!(stats.active_participants, 0);
    }

    #[test]
    fn find_idle_is_strict_and_skips_inactive() {
        let mut store = Store::new();
        let t0 = Instant::now();
        let c = |n| ConnectionId::new(n);

        let old = store.create_conversation(&[c(1), c(2)], t0).unwrap();
        let edge = store.create_conversation(&[c(3), c(4)], t0 + Duration::from_secs(10)).unwrap();
        let ended = store.create_conversation(&[c(5), c(6)], t0).unwrap();
        store.end_conversation(ended.id);

        let idle: Vec<_> =
            store.find_idle(t0 + Duration::from_secs(10)).into_iter().map(|c| c.id).collect();
        assert_eq!(idle, [old.id]);
        assert!(!idle.contains(&edge.id));
    }

    #[test]
    fn update_activity_only_touches_active() {
        let mut store = Store::new();
        let (a, b, _) = ids();
        let t0 = Instant::now();

        let conversation = store.create_conversation(&[a, b], t0).unwrap();
        assert!(store.update_activity(conversation.id, t0 + Duration::from_secs(5)));
        assert!(store.find_idle(t0 + Duration::from_secs(5)).is_empty());

        store.end_conversation(conversation.id);
        assert!(!store.update_activity(conversation.id, t0));
    }

    #[test]
    fn clear_drops_everything() {
        let mut store = Store::new();
        let (a, b, _) = ids();

        store.create_conversation(&[a, b], Instant::now()).unwrap();
        store.clear();

        assert_eq!(store.stats(), StoreStats::default());
        assert_eq!(store.find_by_participant(a), None);
    }
}
