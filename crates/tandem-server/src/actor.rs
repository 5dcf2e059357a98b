//! The engine actor.
//!
//! One task owns the [`Engine`] and the [`Registry`]. Connection tasks talk
//! to it only through [`Command`]s, and timer ticks fire inside the same
//! loop, so no two handlers ever run at the same time.

use std::future::Future;

use tandem_core::{ConnectionId, Engine, EngineStats, Environment, Transport};
use tandem_proto::{ClientEvent, ProtocolError, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::registry::Registry;

/// Commands buffered before connection tasks wait on the actor
pub const COMMAND_CAPACITY: usize = 1024;

/// Request from a connection task to the engine actor.
#[derive(Debug)]
pub enum Command {
    /// A connection was accepted
    Connect {
        /// Sending half of the connection's outbound channel
        outbound: mpsc::Sender<ServerEvent>,
        /// Receives the id assigned to the connection
        reply: oneshot::Sender<ConnectionId>,
    },

    /// A connection closed
    Disconnect {
        /// Connection that went away
        connection: ConnectionId,
    },

    /// A decoded client event
    Event {
        /// Sender
        connection: ConnectionId,
        /// Request
        event: ClientEvent,
    },

    /// A frame whose payload could not be decoded
    Malformed {
        /// Sender
        connection: ConnectionId,
        /// Decode failure
        error: ProtocolError,
    },
}

/// Single owner of engine state.
pub struct EngineActor<E>
where
    E: Environment,
{
    engine: Engine<E>,
    registry: Registry,
    commands: mpsc::Receiver<Command>,
}

impl<E> EngineActor<E>
where
    E: Environment,
{
    /// Wrap `engine`, reading commands from `commands`
    pub fn new(engine: Engine<E>, commands: mpsc::Receiver<Command>) -> Self {
        Self { engine, registry: Registry::new(), commands }
    }

    /// The engine
    pub fn engine(&self) -> &Engine<E> {
        &self.engine
    }

    /// The connection registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Process commands and timers until `shutdown` resolves or every
    /// command sender is gone, then shut the engine down.
    ///
    /// Returns the engine counts taken just before shutdown.
    pub async fn run<F>(mut self, shutdown: F) -> EngineStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("engine actor started");

        loop {
            let env = self.engine.env().clone();
            let wait = self.engine.next_deadline().saturating_duration_since(env.now());

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        debug!("all command senders dropped");
                        break;
                    },
                },
                () = env.sleep(wait) => self.tick(),
                () = &mut shutdown => break,
            }
        }

        let stats = self.engine.shutdown();
        info!(connections = self.registry.connected_count(), "engine actor stopped");
        stats
    }

    /// Apply one command.
    ///
    /// The registry is updated before the engine sees a connect and after it
    /// stops seeing a connection, so liveness queries agree with the events.
    pub fn handle(&mut self, command: Command) {
        let actions = match command {
            Command::Connect { outbound, reply } => {
                let connection = self.assign_id();
                self.registry.register(connection, outbound);

                if reply.send(connection).is_err() {
                    debug!(connection = %connection, "connection closed before id was assigned");
                    self.registry.unregister(connection);
                    return;
                }

                self.engine.on_connect(connection, &self.registry)
            },
            Command::Disconnect { connection } => {
                if !self.registry.is_connected(connection) {
                    warn!(connection = %connection, "disconnect for unknown connection");
                    return;
                }
                self.registry.unregister(connection);
                self.engine.on_disconnect(connection, &self.registry)
            },
            Command::Event { connection, event } => {
                self.engine.on_event(connection, event, &self.registry)
            },
            Command::Malformed { connection, error } => {
                self.engine.on_malformed(connection, &error)
            },
        };

        self.registry.apply_all(actions);
    }

    /// Run the engine's due timers
    pub fn tick(&mut self) {
        let now = self.engine.env().now();
        let actions = self.engine.tick(now, &self.registry);
        self.registry.apply_all(actions);
    }

    fn assign_id(&self) -> ConnectionId {
        loop {
            let candidate = ConnectionId::random(self.engine.env());
            if !self.registry.is_connected(candidate) {
                return candidate;
            }
        }
    }
}
