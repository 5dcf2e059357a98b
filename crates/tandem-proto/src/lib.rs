//! # Tandem Protocol: Wire Format
//!
//! This crate implements the framing layer spoken between a tandem server and
//! its clients. Every event travels as one frame:
//!
//! - **FrameHeader**: 8 bytes of raw binary (Big Endian) carrying magic,
//!   version, opcode and payload length
//! - **Payload**: CBOR-encoded event body (empty for body-less events)
//!
//! ## Event Direction
//!
//! Opcodes are split by direction. `0x01xx` opcodes are client requests
//! ([`ClientEvent`]); `0x02xx` opcodes are server notifications
//! ([`ServerEvent`]). Decoding a frame into the wrong direction is an error,
//! so a client can never inject a server notification.
//!
//! ## Security Properties
//!
//! - **Size Limits**: Payloads are capped at
//!   [`FrameHeader::MAX_PAYLOAD_SIZE`] (16 KiB). Oversized frames are rejected
//!   before CBOR parsing starts.
//! - **Explicit Schema**: Each event body is a plain Rust struct. There is no
//!   generic map parsing that could accept unexpected shapes.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod events;
pub mod frame;
pub mod opcodes;

pub use errors::{ProtocolError, Result};
pub use events::{ClientEvent, ServerEvent};
pub use frame::{Frame, FrameHeader};
pub use opcodes::Opcode;
