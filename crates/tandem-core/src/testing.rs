//! Test doubles shared by unit tests.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tandem_proto::ServerEvent;

use crate::{
    env::Environment,
    ids::{ConnectionId, ConversationId},
    transport::Transport,
};

/// Liveness-only transport; delivery is not under test where it is used.
#[derive(Default)]
pub(crate) struct Live(pub(crate) HashSet<ConnectionId>);

impl Live {
    pub(crate) fn of(raw: &[u64]) -> Self {
        Self(raw.iter().copied().map(ConnectionId::new).collect())
    }
}

impl Transport for Live {
    fn is_connected(&self, connection: ConnectionId) -> bool {
        self.0.contains(&connection)
    }

    fn connected_count(&self) -> usize {
        self.0.len()
    }

    fn is_member(&self, _: ConnectionId, _: ConversationId) -> bool {
        false
    }

    fn emit(&mut self, _: ConnectionId, _: ServerEvent) {}

    fn broadcast_to_group(&mut self, _: ConversationId, _: ServerEvent) {}

    fn broadcast(&mut self, _: ServerEvent) {}

    fn join_group(&mut self, _: ConnectionId, _: ConversationId) {}

    fn disband_group(&mut self, _: ConversationId) {}
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub(crate) struct ManualEnv {
    start: Instant,
    now: Arc<Mutex<Instant>>,
}

impl ManualEnv {
    pub(crate) fn new() -> Self {
        let start = Instant::now();
        Self { start, now: Arc::new(Mutex::new(start)) }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Environment for ManualEnv {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn unix_millis(&self) -> u64 {
        1_700_000_000_000 + (self.now() - self.start).as_millis() as u64
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0x5a);
    }
}
