//! Deterministic simulation harness for the tandem engine.
//!
//! This crate provides a Turmoil-based implementation of `Environment` and an
//! in-memory `Transport`, enabling deterministic, reproducible tests of
//! pairing, messaging and idle timeouts in virtual time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod recording_transport;
pub mod scenario;
pub mod sim_env;

pub use recording_transport::RecordingTransport;
pub use sim_env::SimEnv;
