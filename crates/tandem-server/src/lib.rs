//! Tandem production server
//!
//! Drives a [`tandem_core::Engine`] over real TCP connections.
//!
//! # Task Layout
//!
//! ```text
//!  accept loop ──spawn──▶ connection task (reader) ──┐
//!                               │                     │ Command
//!                               ▼                     ▼
//!                          writer task ◀── outbound ── engine actor
//!                                          channel     (Engine + Registry)
//! ```
//!
//! - The engine actor is the only owner of engine state. Connection events
//!   and timer ticks arrive through one command channel, so every handler
//!   runs as a single uninterruptible unit.
//! - Each connection has one reader (decodes frames, forwards commands) and
//!   one writer (drains the connection's outbound channel).
//! - A slow reader never stalls the actor: outbound channels are bounded and
//!   events to a full channel are dropped.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actor;
pub mod args;
pub mod codec;
pub mod connection;
pub mod listener;
pub mod registry;
pub mod system_env;

pub use actor::{Command, EngineActor};
pub use args::{Args, LogFormat};
pub use registry::Registry;
pub use system_env::SystemEnv;
