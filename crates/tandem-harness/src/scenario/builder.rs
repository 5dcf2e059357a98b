//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tandem_core::EngineConfig;

use crate::{
    SimEnv,
    scenario::{OracleFn, World},
};

/// Virtual time granted to a simulation beyond the scripted advances.
const SIMULATION_SLACK: Duration = Duration::from_secs(60);

/// Virtual clock resolution. Scripted advances should be multiples of it.
const SIMULATION_TICK: Duration = Duration::from_millis(100);

/// One scripted client or clock action.
#[derive(Debug, Clone)]
enum Step {
    Connect(&'static str),
    Disconnect(&'static str),
    Send(&'static str, Option<String>),
    React { actor: &'static str, message_index: u32, emoji: String },
    FindNewPartner(&'static str),
    Bytes(&'static str, Vec<u8>),
    LoseGroup(&'static str),
    Advance(Duration),
}

/// Scenario builder.
///
/// Script connections, client requests and clock advances in order, then add
/// an oracle verification function. Actors are referred to by name; their
/// connection ids come from the seeded simulation RNG.
#[derive(Debug, Clone)]
pub struct Scenario {
    config: EngineConfig,
    seed: u64,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with default configuration and seed 0.
    pub fn new() -> Self {
        Self { config: EngineConfig::default(), seed: 0, steps: Vec::new() }
    }

    /// Configure the engine.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the simulation RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Connect a new actor.
    pub fn connect(mut self, actor: &'static str) -> Self {
        self.steps.push(Step::Connect(actor));
        self
    }

    /// Connect several actors in order.
    pub fn connect_all(self, actors: &[&'static str]) -> Self {
        actors.iter().copied().fold(self, Self::connect)
    }

    /// Drop an actor's connection.
    pub fn disconnect(mut self, actor: &'static str) -> Self {
        self.steps.push(Step::Disconnect(actor));
        self
    }

    /// Send a chat message.
    pub fn send(mut self, actor: &'static str, content: impl Into<String>) -> Self {
        self.steps.push(Step::Send(actor, Some(content.into())));
        self
    }

    /// Send a chat message request with no content field.
    pub fn send_empty(mut self, actor: &'static str) -> Self {
        self.steps.push(Step::Send(actor, None));
        self
    }

    /// React to a message in the actor's most recently matched conversation.
    pub fn react(
        mut self,
        actor: &'static str,
        message_index: u32,
        emoji: impl Into<String>,
    ) -> Self {
        self.steps.push(Step::React { actor, message_index, emoji: emoji.into() });
        self
    }

    /// Ask for a new partner.
    pub fn find_new_partner(mut self, actor: &'static str) -> Self {
        self.steps.push(Step::FindNewPartner(actor));
        self
    }

    /// Deliver raw bytes as if read from the actor's socket.
    pub fn send_bytes(mut self, actor: &'static str, bytes: impl Into<Vec<u8>>) -> Self {
        self.steps.push(Step::Bytes(actor, bytes.into()));
        self
    }

    /// Drop the actor's transport group membership without telling the
    /// engine, as when a join is lost.
    pub fn lose_group(mut self, actor: &'static str) -> Self {
        self.steps.push(Step::LoseGroup(actor));
        self
    }

    /// Advance virtual time, running engine timers as they come due.
    pub fn advance(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Advance(duration));
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }

    fn horizon(&self) -> Duration {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Advance(duration) => Some(*duration),
                _ => None,
            })
            .sum::<Duration>()
            + SIMULATION_SLACK
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Runs every step inside a Turmoil simulation so that clock advances
    /// take no wall time, then invokes the oracle on the final world.
    ///
    /// # Errors
    ///
    /// Returns the first step failure (unknown actor, duplicate connect),
    /// a simulation failure, or the oracle's verdict.
    pub fn run(self) -> Result<(), String> {
        let Scenario { config, seed, steps } = self.scenario.clone();
        config.validate().map_err(|e| format!("invalid engine config: {e}"))?;

        let mut sim = turmoil::Builder::new()
            .simulation_duration(self.scenario.horizon())
            .tick_duration(SIMULATION_TICK)
            .build();

        let finished: Arc<Mutex<Option<World>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&finished);

        sim.client("engine", async move {
            let mut world = World::new(SimEnv::with_seed(seed), config);

            for step in steps {
                execute(&mut world, step).await?;
            }

            *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(world);
            Ok(())
        });

        sim.run().map_err(|e| format!("simulation failed: {e}"))?;

        let world = finished
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| "simulation finished without a world".to_string())?;

        (self.oracle)(&world)
    }
}

async fn execute(world: &mut World, step: Step) -> Result<(), String> {
    match step {
        Step::Connect(actor) => world.connect(actor),
        Step::Disconnect(actor) => world.disconnect(actor),
        Step::Send(actor, content) => world.send(actor, content),
        Step::React { actor, message_index, emoji } => world.react(actor, message_index, emoji),
        Step::FindNewPartner(actor) => world.find_new_partner(actor),
        Step::Bytes(actor, bytes) => world.send_bytes(actor, &bytes),
        Step::LoseGroup(actor) => world.lose_group(actor),
        Step::Advance(duration) => {
            world.advance(duration).await;
            Ok(())
        },
    }
}
