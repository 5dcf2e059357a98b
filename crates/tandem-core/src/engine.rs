//! Engine
//!
//! Owns every piece of pairing state and processes one event at a time.
//!
//! ## Architecture
//!
//! ```text
//! Driver (server / harness)
//!   ├─ Transport (connection registry, groups)
//!   └─ Engine ← THIS MODULE
//!       ├─ Matcher (waiting queue)
//!       ├─ Store (conversations, messages)
//!       ├─ PresenceTracker
//!       ├─ WindowLimiter (messages per connection)
//!       └─ Reaper (idle sweep)
//! ```
//!
//! ## Responsibilities
//!
//! 1. **Serialization**: every handler takes `&mut self`, so queue, store and
//!    presence are never observed half-updated
//! 2. **Gating**: rate limit, validate and sanitize messages before storage
//! 3. **Timers**: reaper sweep, stats broadcast, re-match and limiter pruning
//!    all run from [`Engine::tick`] on the same serialized path
//! 4. **Action Generation**: return actions for the driver to execute
//!    (Sans-IO)
//!
//! ## Driver Contract
//!
//! - Register a connection with the transport before calling
//!   [`Engine::on_connect`]; unregister it before [`Engine::on_disconnect`].
//! - Call [`Engine::tick`] at or after [`Engine::next_deadline`].
//! - Execute returned actions in order.

use std::time::Instant;

use tandem_proto::{
    ClientEvent, ProtocolError, ServerEvent,
    events::{
        client::AddReaction,
        server::{ErrorPayload, ReceiveMessage, ReceiveReaction, UserStats},
    },
};
use tracing::{debug, error, info, warn};

use crate::{
    config::EngineConfig,
    env::Environment,
    error::{ChatError, ErrorKind, ValidationError},
    ids::{ConnectionId, ConversationId},
    matcher::Matcher,
    presence::{Presence, PresenceTracker},
    rate_limiter::{RateDecision, WindowLimiter},
    reaper::Reaper,
    store::{Store, StoreStats},
    transport::{Action, Transport},
    validator,
};

/// Snapshot of engine state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Conversation store counts
    pub store: StoreStats,
    /// Connections in the waiting queue
    pub waiting: usize,
    /// Connections in an active conversation
    pub matched: usize,
}

/// Serialized event processor.
pub struct Engine<E>
where
    E: Environment,
{
    env: E,
    config: EngineConfig,
    store: Store,
    matcher: Matcher,
    presence: PresenceTracker,
    message_limiter: WindowLimiter<ConnectionId>,
    reaper: Reaper,
    next_stats: Instant,
    next_rematch: Instant,
    next_prune: Instant,
}

impl<E> Engine<E>
where
    E: Environment,
{
    /// Create an engine and start its reaper.
    pub fn new(env: E, config: EngineConfig) -> Self {
        let now = env.now();
        let mut reaper = Reaper::new(config.reaper);
        reaper.start(now);

        Self {
            store: Store::new(),
            matcher: Matcher::new(),
            presence: PresenceTracker::new(),
            message_limiter: WindowLimiter::new(config.message_rate),
            reaper,
            next_stats: now + config.stats_interval,
            next_rematch: now + config.rematch_interval,
            next_prune: now + config.prune_interval,
            env,
            config,
        }
    }

    /// The environment
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the conversation store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Read access to the matcher and its queue
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Presence of `connection`, `None` if unknown
    pub fn presence(&self, connection: ConnectionId) -> Option<Presence> {
        self.presence.get(connection)
    }

    /// Active conversation of `connection`
    pub fn conversation_of(&mut self, connection: ConnectionId) -> Option<ConversationId> {
        self.store.find_by_participant(connection).map(|c| c.id)
    }

    /// Current counts
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            store: self.store.stats(),
            waiting: self.matcher.queue().len(),
            matched: self.presence.count(Presence::Matched),
        }
    }

    /// Earliest time at which [`Engine::tick`] has work to do
    pub fn next_deadline(&self) -> Instant {
        let timers = [self.next_stats, self.next_rematch, self.next_prune];
        let earliest = timers.into_iter().min().unwrap_or(self.next_stats);
        self.reaper.next_tick().map_or(earliest, |reap| reap.min(earliest))
    }

    /// A new connection arrived: queue it and try to pair.
    pub fn on_connect<T: Transport>(
        &mut self,
        connection: ConnectionId,
        transport: &T,
    ) -> Vec<Action> {
        info!(connection = %connection, "connected");

        self.presence.set(connection, Presence::Idle);
        let mut actions = self.matcher.enqueue(connection, &mut self.store, &mut self.presence);
        actions.extend(self.match_pass(transport));
        self.flush_stats(transport, &mut actions);
        actions
    }

    /// A connection went away: tear down its conversation and requeue the
    /// partner.
    pub fn on_disconnect<T: Transport>(
        &mut self,
        connection: ConnectionId,
        transport: &T,
    ) -> Vec<Action> {
        info!(connection = %connection, "disconnected");

        self.matcher.dequeue(connection);
        self.message_limiter.remove(&connection);

        let mut actions = self.leave_conversation(connection, transport);
        self.presence.remove(connection);

        actions.extend(self.match_pass(transport));
        self.flush_stats(transport, &mut actions);
        actions
    }

    /// Gate, clean, store and relay a chat message.
    ///
    /// # Errors
    ///
    /// - `ChatError::RateLimited` if the connection's window is exhausted
    /// - `ChatError::Validation` if the content breaks a content rule
    /// - `ChatError::NotMatched` if the connection has no active conversation
    pub fn on_send_message<T: Transport>(
        &mut self,
        connection: ConnectionId,
        content: Option<&str>,
        _transport: &T,
    ) -> Result<Vec<Action>, ChatError> {
        let now = self.env.now();

        if let RateDecision::Limited { retry_after } = self.message_limiter.check(connection, now)
        {
            return Err(ChatError::RateLimited { retry_after });
        }

        validator::validate_message(content)?;

        let content = validator::sanitize_message(content.unwrap_or_default());
        if content.is_empty() {
            return Err(ValidationError::Empty.into());
        }

        let conversation = self
            .store
            .find_by_participant(connection)
            .ok_or(ChatError::NotMatched(connection))?;

        let message = self.store.save_message(conversation.id, connection, content, now)?;

        debug!(
            connection = %connection,
            conversation = %conversation.id,
            message = %message.id,
            "message relayed"
        );

        Ok(vec![Action::BroadcastToGroup {
            group: conversation.id,
            event: ServerEvent::ReceiveMessage(ReceiveMessage {
                sender_id: connection.to_string(),
                content: message.content,
                created_at: self.env.unix_millis(),
            }),
        }])
    }

    /// Relay a reaction to the conversation group.
    ///
    /// A sender missing from the group (lost join) is joined first. Only
    /// messages move `last_activity`, so reactions do not delay the reaper.
    ///
    /// # Errors
    ///
    /// - `ChatError::ConversationNotFound` for an unknown conversation
    /// - `ChatError::Inactive` if it already ended
    /// - `ChatError::NotParticipant` if the sender is not in it
    /// - `ValidationError::InvalidEmoji` / `InvalidConversationId` for bad
    ///   input
    pub fn on_add_reaction<T: Transport>(
        &mut self,
        connection: ConnectionId,
        reaction: AddReaction,
        transport: &T,
    ) -> Result<Vec<Action>, ChatError> {
        let id = ConversationId::parse(&reaction.conversation_id)
            .ok_or(ValidationError::InvalidConversationId)?;

        let conversation = *self.store.get(id).ok_or(ChatError::ConversationNotFound(id))?;

        if !conversation.is_active {
            return Err(ChatError::Inactive(id));
        }

        if !conversation.has_participant(connection) {
            return Err(ChatError::NotParticipant { sender: connection, conversation: id });
        }

        validator::validate_emoji(&reaction.emoji)?;

        let mut actions = Vec::with_capacity(2);

        if !transport.is_member(connection, id) {
            debug!(connection = %connection, conversation = %id, "rejoining conversation group");
            actions.push(Action::JoinGroup { connection, group: id });
        }

        actions.push(Action::BroadcastToGroup {
            group: id,
            event: ServerEvent::ReceiveReaction(ReceiveReaction {
                message_index: reaction.message_index,
                emoji: reaction.emoji,
                sender_id: connection.to_string(),
            }),
        });

        Ok(actions)
    }

    /// Leave the current conversation (if any) and wait for a new partner.
    ///
    /// The abandoned partner is told and requeued ahead of the requester.
    pub fn on_find_new_partner<T: Transport>(
        &mut self,
        connection: ConnectionId,
        transport: &T,
    ) -> Vec<Action> {
        let mut actions = self.leave_conversation(connection, transport);

        if self.presence.get(connection) != Some(Presence::Waiting) {
            self.presence.set(connection, Presence::Idle);
        }
        actions.extend(self.matcher.enqueue(connection, &mut self.store, &mut self.presence));

        actions.extend(self.match_pass(transport));
        self.flush_stats(transport, &mut actions);
        actions
    }

    /// Dispatch one decoded client event.
    ///
    /// Errors never escape: they are logged and answered with an `error`
    /// event to the triggering connection only.
    pub fn on_event<T: Transport>(
        &mut self,
        connection: ConnectionId,
        event: ClientEvent,
        transport: &T,
    ) -> Vec<Action> {
        let result = match event {
            ClientEvent::SendMessage(message) => {
                self.on_send_message(connection, message.content.as_deref(), transport)
            },
            ClientEvent::AddReaction(reaction) => {
                self.on_add_reaction(connection, reaction, transport)
            },
            ClientEvent::FindNewPartner => Ok(self.on_find_new_partner(connection, transport)),
        };

        match result {
            Ok(actions) => actions,
            Err(err) => {
                match err.kind() {
                    ErrorKind::Validation | ErrorKind::RateLimited => {
                        warn!(connection = %connection, error = %err, "request rejected");
                    },
                    _ => {
                        error!(connection = %connection, error = %err, "request failed");
                    },
                }

                vec![Action::Emit {
                    to: connection,
                    event: ServerEvent::Error(ErrorPayload {
                        message: err.user_message().to_string(),
                        retry_after: err.retry_after_secs(),
                    }),
                }]
            },
        }
    }

    /// Answer a frame that could not be decoded.
    pub fn on_malformed(&mut self, connection: ConnectionId, err: &ProtocolError) -> Vec<Action> {
        warn!(connection = %connection, error = %err, "malformed request");
        vec![Action::Emit { to: connection, event: ServerEvent::error("Invalid request") }]
    }

    /// Run every timer that is due at `now`.
    pub fn tick<T: Transport>(&mut self, now: Instant, transport: &T) -> Vec<Action> {
        let sweep = self.reaper.poll(now, &mut self.store, transport);
        let mut actions = sweep.actions;

        for conversation in &sweep.ended {
            for participant in conversation.participants {
                if transport.is_connected(participant) {
                    self.presence.set(participant, Presence::Idle);
                    actions.extend(self.matcher.enqueue(
                        participant,
                        &mut self.store,
                        &mut self.presence,
                    ));
                } else {
                    self.presence.remove(participant);
                }
            }
        }

        if now >= self.next_rematch {
            self.next_rematch = now + self.config.rematch_interval;
            actions.extend(self.match_pass(transport));
        }

        if now >= self.next_prune {
            self.next_prune = now + self.config.prune_interval;
            let pruned = self.message_limiter.prune(now);
            if pruned > 0 {
                debug!(pruned, tracked = self.message_limiter.len(), "pruned rate limiter");
            }
        }

        if now >= self.next_stats {
            self.next_stats = now + self.config.stats_interval;
            self.presence.take_dirty();
            actions.push(self.stats_broadcast(transport));
        } else {
            self.flush_stats(transport, &mut actions);
        }

        actions
    }

    /// Stop timers and drop all state.
    ///
    /// Returns the counts just before clearing.
    pub fn shutdown(&mut self) -> EngineStats {
        self.reaper.stop();
        let stats = self.stats();

        self.store.clear();
        self.matcher.clear();
        self.presence.clear();
        self.message_limiter.clear();

        info!(
            conversations = stats.store.total_conversations,
            active = stats.store.active_conversations,
            waiting = stats.waiting,
            "engine shut down"
        );

        stats
    }

    /// End `connection`'s active conversation, if any, telling the partner
    /// and putting them back in the queue when still connected.
    fn leave_conversation<T: Transport>(
        &mut self,
        connection: ConnectionId,
        transport: &T,
    ) -> Vec<Action> {
        let Some(conversation) = self.store.find_by_participant(connection) else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        let partner = conversation.partner_of(connection);

        if let Some(partner) = partner {
            if transport.is_connected(partner) {
                actions.push(Action::Emit { to: partner, event: ServerEvent::PartnerDisconnected });
            }
        }

        self.store.end_conversation(conversation.id);
        actions.push(Action::DisbandGroup { group: conversation.id });
        info!(conversation = %conversation.id, left_by = %connection, "conversation ended");

        if let Some(partner) = partner {
            if transport.is_connected(partner) {
                self.presence.set(partner, Presence::Idle);
                actions.extend(self.matcher.enqueue(
                    partner,
                    &mut self.store,
                    &mut self.presence,
                ));
            } else {
                self.presence.remove(partner);
            }
        }

        actions
    }

    fn match_pass<T: Transport>(&mut self, transport: &T) -> Vec<Action> {
        let now = self.env.now();
        self.matcher.attempt_match_all(&mut self.store, &mut self.presence, transport, now)
    }

    fn stats_broadcast<T: Transport>(&self, transport: &T) -> Action {
        Action::BroadcastAll {
            event: ServerEvent::UserStats(UserStats {
                online_users: transport.connected_count() as u64,
                waiting_users: self.presence.waiting_count() as u64,
            }),
        }
    }

    fn flush_stats<T: Transport>(&mut self, transport: &T, actions: &mut Vec<Action>) {
        if self.presence.take_dirty() {
            actions.push(self.stats_broadcast(transport));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tandem_proto::events::server::Matched;

    use super::*;
    use crate::testing::{Live, ManualEnv};

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn engine() -> (Engine<ManualEnv>, ManualEnv) {
        let env = ManualEnv::new();
        (Engine::new(env.clone(), EngineConfig::default()), env)
    }

    fn emitted_to(actions: &[Action], to: ConnectionId) -> Vec<&ServerEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Emit { to: t, event } if *t == to => Some(event),
                _ => None,
            })
            .collect()
    }

    fn matched_pair(engine: &mut Engine<ManualEnv>, live: &Live) -> ConversationId {
        engine.on_connect(conn(1), live);
        engine.on_connect(conn(2), live);
        engine.conversation_of(conn(1)).expect("1 and 2 are matched")
    }

    #[test]
    fn second_connection_gets_matched() {
        let (mut engine, _) = engine();
        let live = Live::of(&[1, 2]);

        let first = engine.on_connect(conn(1), &live);
        assert_eq!(emitted_to(&first, conn(1)), [&ServerEvent::Waiting]);

        let second = engine.on_connect(conn(2), &live);
        let conversation = engine.conversation_of(conn(2)).unwrap();

        assert_eq!(
            emitted_to(&second, conn(1)),
            [&ServerEvent::Matched(Matched {
                conversation_id: conversation.to_string(),
                partner_id: conn(2).to_string(),
            })]
        );
        assert_eq!(engine.presence(conn(1)), Some(Presence::Matched));
        assert!(second.iter().any(|a| matches!(
            a,
            Action::BroadcastAll { event: ServerEvent::UserStats(s) } if s.online_users == 2
        )));
    }

    #[test]
    fn message_is_sanitized_and_broadcast() {
        let (mut engine, _) = engine();
        let live = Live::of(&[1, 2]);
        let conversation = matched_pair(&mut engine, &live);

        let actions =
            engine.on_send_message(conn(1), Some("  hi https://x.test/aaaaaaaa  "), &live).unwrap();

        match actions.as_slice() {
            [Action::BroadcastToGroup { group, event: ServerEvent::ReceiveMessage(m) }] => {
                assert_eq!(*group, conversation);
                assert_eq!(m.content, "hi https://x.test/aaaaaaaa");
                assert_eq!(m.sender_id, conn(1).to_string());
            },
            other => panic!("unexpected actions: {other:?}"),
        }
        assert_eq!(engine.store().list_messages(conversation).len(), 1);
    }

    #[test]
    fn unmatched_sender_gets_error_event() {
        let (mut engine, _) = engine();
        let live = Live::of(&[1]);
        engine.on_connect(conn(1), &live);

        let event = ClientEvent::SendMessage(tandem_proto::events::client::SendMessage {
            content: Some("hello?".into()),
        });
        let actions = engine.on_event(conn(1), event, &live);

        assert_eq!(actions, [Action::Emit {
            to: conn(1),
            event: ServerEvent::error("You are not in a conversation"),
        }]);
    }

    #[test]
    fn eleventh_message_in_window_is_throttled() {
        let (mut engine, env) = engine();
        let live = Live::of(&[1, 2]);
        matched_pair(&mut engine, &live);

        for i in 0..10 {
            engine.on_send_message(conn(1), Some(&format!("message {i}")), &live).unwrap();
        }

        let err = engine.on_send_message(conn(1), Some("one more"), &live).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);

        // The partner has its own window.
        assert!(engine.on_send_message(conn(2), Some("fine"), &live).is_ok());

        env.advance(Duration::from_secs(10));
        assert!(engine.on_send_message(conn(1), Some("again"), &live).is_ok());
    }

    #[test]
    fn disconnect_notifies_and_requeues_partner() {
        let (mut engine, _) = engine();
        let mut live = Live::of(&[1, 2]);
        let conversation = matched_pair(&mut engine, &live);
        engine.on_send_message(conn(1), Some("bye"), &live).unwrap();

        live.0.remove(&conn(1));
        let actions = engine.on_disconnect(conn(1), &live);

        assert_eq!(
            emitted_to(&actions, conn(2)),
            [&ServerEvent::PartnerDisconnected, &ServerEvent::Waiting]
        );
        assert!(!engine.store().get(conversation).unwrap().is_active);
        assert!(engine.store().list_messages(conversation).is_empty());
        assert_eq!(engine.presence(conn(1)), None);
        assert_eq!(engine.presence(conn(2)), Some(Presence::Waiting));
    }

    #[test]
    fn find_new_partner_moves_both_sides() {
        let (mut engine, _) = engine();
        let live = Live::of(&[1, 2, 3]);
        let first = matched_pair(&mut engine, &live);
        engine.on_connect(conn(3), &live);

        let actions = engine.on_event(conn(1), ClientEvent::FindNewPartner, &live);

        assert!(!engine.store().get(first).unwrap().is_active);
        assert!(emitted_to(&actions, conn(2)).contains(&&ServerEvent::PartnerDisconnected));

        // 3 waited longest, then 2 was requeued ahead of 1.
        let second = engine.conversation_of(conn(3)).expect("3 is matched");
        assert_eq!(engine.conversation_of(conn(2)), Some(second));
        assert_eq!(engine.presence(conn(1)), Some(Presence::Waiting));
    }

    #[test]
    fn reaction_rejoins_missing_member() {
        let (mut engine, _) = engine();
        let live = Live::of(&[1, 2]);
        let conversation = matched_pair(&mut engine, &live);

        let reaction = AddReaction {
            conversation_id: conversation.to_string(),
            message_index: 0,
            emoji: "❤️".into(),
        };
        let actions = engine.on_add_reaction(conn(2), reaction, &live).unwrap();

        assert_eq!(actions[0], Action::JoinGroup { connection: conn(2), group: conversation });
        assert!(matches!(
            &actions[1],
            Action::BroadcastToGroup { event: ServerEvent::ReceiveReaction(r), .. }
                if r.emoji == "❤️"
        ));
    }

    #[test]
    fn reaction_checks_conversation_and_sender() {
        let (mut engine, _) = engine();
        let live = Live::of(&[1, 2, 3]);
        let conversation = matched_pair(&mut engine, &live);

        let react = |id: String, emoji: &str| AddReaction {
            conversation_id: id,
            message_index: 3,
            emoji: emoji.into(),
        };

        let err = engine.on_add_reaction(conn(3), react(conversation.to_string(), "👍"), &live);
        assert_eq!(err.unwrap_err().kind(), ErrorKind::Authorization);

        let unknown = ConversationId::new(77).to_string();
        let err = engine.on_add_reaction(conn(1), react(unknown, "👍"), &live);
        assert_eq!(err.unwrap_err().kind(), ErrorKind::NotFound);

        let err = engine.on_add_reaction(conn(1), react("nope".into(), "👍"), &live);
        assert_eq!(err.unwrap_err().kind(), ErrorKind::Validation);

        let err = engine.on_add_reaction(conn(1), react(conversation.to_string(), ""), &live);
        assert_eq!(err.unwrap_err(), ChatError::Validation(ValidationError::InvalidEmoji));

        engine.on_find_new_partner(conn(1), &live);
        let err = engine.on_add_reaction(conn(2), react(conversation.to_string(), "👍"), &live);
        assert_eq!(err.unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn tick_times_out_idle_conversation() {
        let (mut engine, env) = engine();
        let live = Live::of(&[1, 2]);
        let conversation = matched_pair(&mut engine, &live);

        env.advance(Duration::from_secs(60));
        let actions = engine.tick(env.now(), &live);
        assert!(emitted_to(&actions, conn(1)).is_empty());
        assert!(engine.store().get(conversation).unwrap().is_active);

        env.advance(Duration::from_secs(10));
        let actions = engine.tick(env.now(), &live);

        for side in [conn(1), conn(2)] {
            let events = emitted_to(&actions, side);
            assert!(matches!(events[0], ServerEvent::ConversationTimeout(_)));
        }
        assert!(!engine.store().get(conversation).unwrap().is_active);
    }

    #[test]
    fn reaction_does_not_postpone_timeout() {
        let (mut engine, env) = engine();
        let live = Live::of(&[1, 2]);
        let conversation = matched_pair(&mut engine, &live);
        let started = engine.store().get(conversation).unwrap().last_activity;

        env.advance(Duration::from_secs(50));
        let reaction = AddReaction {
            conversation_id: conversation.to_string(),
            message_index: 0,
            emoji: "👍".into(),
        };
        engine.on_add_reaction(conn(2), reaction, &live).unwrap();
        assert_eq!(engine.store().get(conversation).unwrap().last_activity, started);

        env.advance(Duration::from_secs(20));
        let actions = engine.tick(env.now(), &live);

        assert!(matches!(emitted_to(&actions, conn(1))[0], ServerEvent::ConversationTimeout(_)));
        assert!(!engine.store().get(conversation).unwrap().is_active);
    }

    #[test]
    fn ending_a_conversation_disbands_its_group() {
        let (mut engine, env) = engine();
        let live = Live::of(&[1, 2]);
        let first = matched_pair(&mut engine, &live);

        let actions = engine.on_find_new_partner(conn(1), &live);
        assert!(actions.contains(&Action::DisbandGroup { group: first }));

        let second = engine.conversation_of(conn(1)).expect("1 and 2 are matched again");
        env.advance(Duration::from_secs(70));
        let actions = engine.tick(env.now(), &live);
        assert!(actions.contains(&Action::DisbandGroup { group: second }));
    }

    #[test]
    fn stats_broadcast_on_interval() {
        let (mut engine, env) = engine();
        let live = Live::of(&[1]);
        engine.on_connect(conn(1), &live);

        env.advance(Duration::from_secs(5));
        assert!(engine.tick(env.now(), &live).is_empty());

        env.advance(Duration::from_secs(5));
        let actions = engine.tick(env.now(), &live);
        assert_eq!(actions, [Action::BroadcastAll {
            event: ServerEvent::UserStats(UserStats { online_users: 1, waiting_users: 1 }),
        }]);
    }

    #[test]
    fn next_deadline_is_earliest_timer() {
        let (engine, env) = engine();
        assert_eq!(engine.next_deadline(), env.now() + Duration::from_secs(5));
    }

    #[test]
    fn shutdown_clears_state() {
        let (mut engine, _) = engine();
        let live = Live::of(&[1, 2, 3]);
        matched_pair(&mut engine, &live);
        engine.on_connect(conn(3), &live);

        let stats = engine.shutdown();
        assert_eq!(stats.store.active_conversations, 1);
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.matched, 2);

        assert_eq!(engine.stats(), EngineStats::default());
    }
}
