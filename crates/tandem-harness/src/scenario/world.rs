//! World state for scenario execution.
//!
//! The World owns one engine and one recording transport, maps actor names
//! to connection ids, and drives engine handlers the way the production
//! driver does: register with the transport first, call the handler, then
//! apply the returned actions in order.

use std::time::Duration;

use tandem_core::{
    ConnectionId, ConversationId, Engine, EngineConfig, EngineStats, Environment, Transport,
    presence::Presence, store::Conversation,
};
use tandem_proto::{
    ClientEvent, Frame, ServerEvent,
    events::{
        client::{AddReaction, SendMessage},
        server::{ReceiveMessage, UserStats},
    },
};
use tracing::debug;

use crate::{RecordingTransport, SimEnv};

/// Engine, transport and named actors of one scenario.
pub struct World {
    engine: Engine<SimEnv>,
    transport: RecordingTransport,
    actors: Vec<(&'static str, ConnectionId)>,
    elapsed: Duration,
}

impl World {
    pub(crate) fn new(env: SimEnv, config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(env, config),
            transport: RecordingTransport::new(),
            actors: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// The engine under test
    pub fn engine(&self) -> &Engine<SimEnv> {
        &self.engine
    }

    /// The transport, with every delivered event
    pub fn transport(&self) -> &RecordingTransport {
        &self.transport
    }

    /// Engine counts at the end of the scenario
    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// Virtual time advanced by the scenario
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Actor names in connection order
    pub fn actors(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.actors.iter().map(|(name, _)| *name)
    }

    /// Connection id assigned to `actor`
    pub fn connection(&self, actor: &str) -> Option<ConnectionId> {
        self.actors.iter().find(|(name, _)| *name == actor).map(|(_, id)| *id)
    }

    /// Actor name of a connection id
    pub fn actor_of(&self, connection: ConnectionId) -> Option<&'static str> {
        self.actors.iter().find(|(_, id)| *id == connection).map(|(name, _)| *name)
    }

    /// Is `actor` still connected?
    pub fn is_connected(&self, actor: &str) -> bool {
        self.connection(actor).is_some_and(|id| self.transport.is_connected(id))
    }

    /// Everything `actor` received, oldest first
    pub fn inbox(&self, actor: &str) -> &[ServerEvent] {
        self.connection(actor).map(|id| self.transport.inbox(id)).unwrap_or_default()
    }

    /// Names of the events `actor` received, leaving out `user-stats` noise
    pub fn event_names(&self, actor: &str) -> Vec<&'static str> {
        self.inbox(actor)
            .iter()
            .filter(|event| !matches!(event, ServerEvent::UserStats(_)))
            .map(ServerEvent::name)
            .collect()
    }

    /// Number of `event_name` events `actor` received
    pub fn count(&self, actor: &str, event_name: &str) -> usize {
        self.inbox(actor).iter().filter(|event| event.name() == event_name).count()
    }

    /// Chat messages `actor` received
    pub fn messages(&self, actor: &str) -> Vec<&ReceiveMessage> {
        self.inbox(actor)
            .iter()
            .filter_map(|event| match event {
                ServerEvent::ReceiveMessage(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Latest `user-stats` seen by `actor`
    pub fn last_stats(&self, actor: &str) -> Option<UserStats> {
        self.inbox(actor).iter().rev().find_map(|event| match event {
            ServerEvent::UserStats(stats) => Some(*stats),
            _ => None,
        })
    }

    /// Conversation id from the latest `matched` event `actor` received
    pub fn last_matched(&self, actor: &str) -> Option<ConversationId> {
        self.inbox(actor).iter().rev().find_map(|event| match event {
            ServerEvent::Matched(matched) => ConversationId::parse(&matched.conversation_id),
            _ => None,
        })
    }

    /// Active conversation `actor` is currently in
    pub fn conversation(&self, actor: &str) -> Option<Conversation> {
        let id = self.connection(actor)?;
        let conversation = *self.engine.store().get(self.last_matched(actor)?)?;
        (conversation.is_active && conversation.has_participant(id)).then_some(conversation)
    }

    /// Current partner of `actor`
    pub fn partner(&self, actor: &str) -> Option<&'static str> {
        let id = self.connection(actor)?;
        let partner = self.conversation(actor)?.partner_of(id)?;
        self.actor_of(partner)
    }

    /// Is `actor` in the waiting queue?
    pub fn is_waiting(&self, actor: &str) -> bool {
        self.connection(actor).is_some_and(|id| self.engine.matcher().queue().contains(id))
    }

    /// Presence the engine tracks for `actor`
    pub fn presence(&self, actor: &str) -> Option<Presence> {
        self.engine.presence(self.connection(actor)?)
    }

    /// Every actor with its full inbox, in connection order
    pub fn transcript(&self) -> Vec<(&'static str, Vec<ServerEvent>)> {
        self.actors.iter().map(|(name, id)| (*name, self.transport.inbox(*id).to_vec())).collect()
    }

    pub(crate) fn connect(&mut self, actor: &'static str) -> Result<(), String> {
        if self.connection(actor).is_some() {
            return Err(format!("actor {actor} connected twice"));
        }

        let id = ConnectionId::random(self.engine.env());
        self.actors.push((actor, id));

        self.transport.connect(id);
        let actions = self.engine.on_connect(id, &self.transport);
        self.transport.apply_all(actions);
        Ok(())
    }

    pub(crate) fn disconnect(&mut self, actor: &'static str) -> Result<(), String> {
        let id = self.require(actor)?;

        self.transport.disconnect(id);
        let actions = self.engine.on_disconnect(id, &self.transport);
        self.transport.apply_all(actions);
        Ok(())
    }

    pub(crate) fn send(
        &mut self,
        actor: &'static str,
        content: Option<String>,
    ) -> Result<(), String> {
        self.dispatch(actor, ClientEvent::SendMessage(SendMessage { content }))
    }

    pub(crate) fn react(
        &mut self,
        actor: &'static str,
        message_index: u32,
        emoji: String,
    ) -> Result<(), String> {
        let conversation_id = self.last_matched(actor).map(|id| id.to_string()).unwrap_or_default();
        self.dispatch(
            actor,
            ClientEvent::AddReaction(AddReaction { conversation_id, message_index, emoji }),
        )
    }

    pub(crate) fn find_new_partner(&mut self, actor: &'static str) -> Result<(), String> {
        self.dispatch(actor, ClientEvent::FindNewPartner)
    }

    /// Feed raw bytes through the same decode path as the server.
    ///
    /// Header corruption disconnects the actor; payload errors are answered
    /// with an `error` event.
    pub(crate) fn send_bytes(&mut self, actor: &'static str, bytes: &[u8]) -> Result<(), String> {
        let id = self.require(actor)?;

        match Frame::decode(bytes).and_then(|frame| ClientEvent::from_frame(&frame)) {
            Ok(event) => self.dispatch(actor, event),
            Err(err) if err.is_fatal() => {
                debug!(actor, error = %err, "closing on corrupt frame");
                self.disconnect(actor)
            },
            Err(err) => {
                let actions = self.engine.on_malformed(id, &err);
                self.transport.apply_all(actions);
                Ok(())
            },
        }
    }

    pub(crate) fn lose_group(&mut self, actor: &'static str) -> Result<(), String> {
        let id = self.require(actor)?;
        let group = self.last_matched(actor).ok_or_else(|| format!("{actor} was never matched"))?;
        self.transport.leave_group(id, group);
        Ok(())
    }

    /// Advance virtual time, ticking the engine at every deadline on the way.
    pub(crate) async fn advance(&mut self, by: Duration) {
        let env = self.engine.env().clone();
        let until = env.now() + by;

        loop {
            let deadline = self.engine.next_deadline();
            if deadline > until {
                break;
            }

            env.sleep(deadline.saturating_duration_since(env.now())).await;
            let actions = self.engine.tick(env.now(), &self.transport);
            self.transport.apply_all(actions);
        }

        env.sleep(until.saturating_duration_since(env.now())).await;
        self.elapsed += by;
    }

    fn dispatch(&mut self, actor: &'static str, event: ClientEvent) -> Result<(), String> {
        let id = self.require(actor)?;

        let actions = self.engine.on_event(id, event, &self.transport);
        self.transport.apply_all(actions);
        Ok(())
    }

    fn require(&self, actor: &str) -> Result<ConnectionId, String> {
        self.connection(actor).ok_or_else(|| format!("unknown actor {actor}"))
    }
}
