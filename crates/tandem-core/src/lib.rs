//! Tandem core logic
//!
//! This crate contains the pure state machines that pair anonymous
//! connections into one-on-one conversations. It is completely decoupled from
//! I/O, enabling deterministic testing.
//!
//! # Architecture: "The Hollow Shell"
//!
//! ```text
//!      ┌────────────────────────────────┐
//!      │ tandem-core                    │
//!      │ - Waiting queue + matcher      │
//!      │ - Conversation store           │
//!      │ - Idle reaper, rate limiting   │
//!      │ - Content validation           │
//!      └────────────────────────────────┘
//!         ↓                      ↓
//! ┌────────────────┐  ┌────────────────┐
//! │ tandem-harness │  │ tandem-server  │
//! │ (Turmoil)      │  │ (Tokio)        │
//! │ - Virtual time │  │ - Real network │
//! │ - Seeded RNG   │  │ - System clock │
//! └────────────────┘  └────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - No I/O in Core: handlers receive `now` and return [`transport::Action`]s for
//!   the driver to execute
//! - Single Owner: the [`engine::Engine`] is mutated through `&mut self` only,
//!   so every event is processed as one uninterruptible unit
//! - Environment Trait: time and randomness go through [`env::Environment`]
//!
//! # Modules
//!
//! - [`engine`]: Serialized event path tying all components together
//! - [`matcher`]: FIFO waiting queue and pairing
//! - [`store`]: Conversations, participant index, message buffers
//! - [`reaper`]: Idle conversation sweep
//! - [`rate_limiter`]: Fixed-window limiters
//! - [`validator`]: Message validation and sanitization
//! - [`presence`]: Idle / Waiting / Matched tracker
//! - [`transport`]: Contract the driver's connection registry fulfils
//! - [`config`]: Engine configuration
//! - [`env`]: Environment abstraction (time, RNG)
//! - [`error`]: Error taxonomy

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod ids;
pub mod matcher;
pub mod presence;
pub mod rate_limiter;
pub mod reaper;
pub mod store;
#[cfg(test)]
mod testing;
pub mod transport;
pub mod validator;

pub use config::EngineConfig;
pub use engine::{Engine, EngineStats};
pub use env::Environment;
pub use error::{ChatError, ErrorKind, ValidationError};
pub use ids::{ConnectionId, ConversationId, MessageId};
pub use transport::{Action, Transport};
