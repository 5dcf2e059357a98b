//! Typed events carried in frame payloads.
//!
//! Each opcode has exactly one event variant. Only the inner struct is
//! CBOR-encoded; the variant is identified by the frame header's opcode, so
//! a mismatched opcode/payload pair fails to decode instead of being
//! reinterpreted.

pub mod client;
pub mod server;

use bytes::BufMut;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

fn write_cbor<T: Serialize>(value: &T, dst: &mut impl BufMut) -> Result<()> {
    ciborium::ser::into_writer(value, dst.writer())
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))
}

fn read_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: bytes.len(),
            max: FrameHeader::MAX_PAYLOAD_SIZE,
        });
    }

    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

fn frame_opcode(frame: &Frame) -> Result<Opcode> {
    frame.header.opcode_enum().ok_or(ProtocolError::InvalidOpcode(frame.header.opcode()))
}

fn into_frame(opcode: Opcode, encode: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> Result<Frame> {
    let mut buf = Vec::new();
    encode(&mut buf)?;

    if buf.len() > FrameHeader::MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: buf.len(),
            max: FrameHeader::MAX_PAYLOAD_SIZE,
        });
    }

    Ok(Frame::new(FrameHeader::new(opcode), buf))
}

/// Requests a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Send a chat message
    SendMessage(client::SendMessage),
    /// React to a message
    AddReaction(client::AddReaction),
    /// Drop the current partner and wait for a new one
    FindNewPartner,
}

impl ClientEvent {
    /// Get the opcode for this event
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::SendMessage(_) => Opcode::SendMessage,
            Self::AddReaction(_) => Opcode::AddReaction,
            Self::FindNewPartner => Opcode::FindNewPartner,
        }
    }

    /// Encode the event body (no variant tag)
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborEncode`] if serialization fails.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        match self {
            Self::SendMessage(inner) => write_cbor(inner, dst),
            Self::AddReaction(inner) => write_cbor(inner, dst),
            Self::FindNewPartner => Ok(()),
        }
    }

    /// Decode an event body for `opcode`
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedDirection`] for server opcodes and
    /// [`ProtocolError::CborDecode`] for malformed bodies.
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        match opcode {
            Opcode::SendMessage => Ok(Self::SendMessage(read_cbor(bytes)?)),
            Opcode::AddReaction => Ok(Self::AddReaction(read_cbor(bytes)?)),
            Opcode::FindNewPartner => Ok(Self::FindNewPartner),
            other => Err(ProtocolError::UnexpectedDirection {
                opcode: other.to_u16(),
                expected: "client",
            }),
        }
    }

    /// Convert event into a transport frame
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails or the body exceeds the size limit.
    pub fn into_frame(self) -> Result<Frame> {
        into_frame(self.opcode(), |buf| self.encode(buf))
    }

    /// Parse event from a raw transport frame
    ///
    /// # Errors
    ///
    /// Returns error if the opcode is unknown, misdirected, or the body is
    /// malformed.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Self::decode(frame_opcode(frame)?, &frame.payload)
    }
}

/// Notifications the server sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Entered the waiting queue
    Waiting,
    /// Paired with a partner
    Matched(server::Matched),
    /// Message relayed in the conversation
    ReceiveMessage(server::ReceiveMessage),
    /// Reaction relayed in the conversation
    ReceiveReaction(server::ReceiveReaction),
    /// Partner left the conversation
    PartnerDisconnected,
    /// Conversation ended for inactivity
    ConversationTimeout(server::ConversationTimeout),
    /// Presence statistics
    UserStats(server::UserStats),
    /// Request failed
    Error(server::ErrorPayload),
}

impl ServerEvent {
    /// Build an error notice without a retry hint.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(server::ErrorPayload { message: message.into(), retry_after: None })
    }

    /// Get the opcode for this event
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Waiting => Opcode::Waiting,
            Self::Matched(_) => Opcode::Matched,
            Self::ReceiveMessage(_) => Opcode::ReceiveMessage,
            Self::ReceiveReaction(_) => Opcode::ReceiveReaction,
            Self::PartnerDisconnected => Opcode::PartnerDisconnected,
            Self::ConversationTimeout(_) => Opcode::ConversationTimeout,
            Self::UserStats(_) => Opcode::UserStats,
            Self::Error(_) => Opcode::Error,
        }
    }

    /// Event name as seen by clients
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.opcode().event_name()
    }

    /// Encode the event body (no variant tag)
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborEncode`] if serialization fails.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        match self {
            Self::Waiting | Self::PartnerDisconnected => Ok(()),
            Self::Matched(inner) => write_cbor(inner, dst),
            Self::ReceiveMessage(inner) => write_cbor(inner, dst),
            Self::ReceiveReaction(inner) => write_cbor(inner, dst),
            Self::ConversationTimeout(inner) => write_cbor(inner, dst),
            Self::UserStats(inner) => write_cbor(inner, dst),
            Self::Error(inner) => write_cbor(inner, dst),
        }
    }

    /// Decode an event body for `opcode`
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedDirection`] for client opcodes and
    /// [`ProtocolError::CborDecode`] for malformed bodies.
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        match opcode {
            Opcode::Waiting => Ok(Self::Waiting),
            Opcode::Matched => Ok(Self::Matched(read_cbor(bytes)?)),
            Opcode::ReceiveMessage => Ok(Self::ReceiveMessage(read_cbor(bytes)?)),
            Opcode::ReceiveReaction => Ok(Self::ReceiveReaction(read_cbor(bytes)?)),
            Opcode::PartnerDisconnected => Ok(Self::PartnerDisconnected),
            Opcode::ConversationTimeout => Ok(Self::ConversationTimeout(read_cbor(bytes)?)),
            Opcode::UserStats => Ok(Self::UserStats(read_cbor(bytes)?)),
            Opcode::Error => Ok(Self::Error(read_cbor(bytes)?)),
            other => Err(ProtocolError::UnexpectedDirection {
                opcode: other.to_u16(),
                expected: "server",
            }),
        }
    }

    /// Convert event into a transport frame
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails or the body exceeds the size limit.
    pub fn into_frame(self) -> Result<Frame> {
        into_frame(self.opcode(), |buf| self.encode(buf))
    }

    /// Parse event from a raw transport frame
    ///
    /// # Errors
    ///
    /// Returns error if the opcode is unknown, misdirected, or the body is
    /// malformed.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Self::decode(frame_opcode(frame)?, &frame.payload)
    }
}
