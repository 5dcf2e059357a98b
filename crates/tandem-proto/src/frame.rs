//! Frame type combining header and payload.
//!
//! Layout on the wire:
//! `[FrameHeader: 8 bytes, raw binary] + [payload: variable bytes]`
//!
//! ```text
//!  0       2       3       4               6               8
//!  ├───────┼───────┼───────┼───────────────┼───────────────┤
//!  │ magic │ ver   │ rsvd  │ opcode (BE)   │ payload_len   │
//!  └───────┴───────┴───────┴───────────────┴───────────────┘
//! ```
//!
//! This is a pure data holder. For typed events see
//! [`ClientEvent`](crate::ClientEvent) and [`ServerEvent`](crate::ServerEvent).

use bytes::{BufMut, Bytes};

use crate::{
    Opcode,
    errors::{ProtocolError, Result},
};

/// Fixed-size frame header.
///
/// # Invariants
///
/// - `magic == FrameHeader::MAGIC` and `version == FrameHeader::VERSION` for
///   every header produced by [`FrameHeader::from_bytes`]
/// - `payload_len <= FrameHeader::MAX_PAYLOAD_SIZE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    opcode: u16,
    payload_len: u16,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    /// Magic number ("TD")
    pub const MAGIC: u16 = 0x5444;

    /// Current protocol version
    pub const VERSION: u8 = 1;

    /// Largest payload a frame may carry (16 KiB)
    pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024;

    /// Create a header for `opcode` with an empty payload.
    #[must_use]
    pub const fn new(opcode: Opcode) -> Self {
        Self { opcode: opcode.to_u16(), payload_len: 0 }
    }

    /// Raw opcode value
    #[must_use]
    pub const fn opcode(&self) -> u16 {
        self.opcode
    }

    /// Opcode as enum, `None` if unknown
    #[must_use]
    pub const fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u16(self.opcode)
    }

    /// Payload length claimed by this header
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        self.payload_len as usize
    }

    /// Serialize to wire bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&Self::MAGIC.to_be_bytes());
        bytes[2] = Self::VERSION;
        bytes[4..6].copy_from_slice(&self.opcode.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.payload_len.to_be_bytes());
        bytes
    }

    /// Parse a header from the first [`FrameHeader::SIZE`] bytes.
    ///
    /// The opcode is NOT validated here, so a frame with an unknown opcode
    /// can still be skipped without losing stream sync.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer is short, the magic or version is wrong,
    /// or the claimed payload length exceeds the limit.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() });
        }

        if u16::from_be_bytes([bytes[0], bytes[1]]) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if bytes[2] != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(bytes[2]));
        }

        let opcode = u16::from_be_bytes([bytes[4], bytes[5]]);
        let payload_len = u16::from_be_bytes([bytes[6], bytes[7]]);

        if payload_len as usize > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len as usize,
                max: Self::MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self { opcode, payload_len })
    }
}

/// Complete protocol frame.
///
/// Holds raw payload bytes, not a typed event, so a driver can route or
/// reject frames without deserializing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,

    /// Raw payload bytes (already CBOR-encoded)
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame with automatic payload length calculation.
    ///
    /// Oversized payloads are accepted here and rejected by
    /// [`Frame::encode`], which keeps construction infallible for tests.
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();

        #[allow(clippy::cast_possible_truncation)]
        {
            header.payload_len = payload.len().min(u16::MAX as usize) as u16;
        }

        Self { header, payload }
    }

    /// Encode frame into buffer
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`FrameHeader::MAX_PAYLOAD_SIZE`].
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE,
            });
        }

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Decode one frame from the start of `bytes`.
    ///
    /// Trailing data after the frame is ignored.
    ///
    /// # Errors
    ///
    /// Returns error if header parsing fails or the payload is truncated.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let payload_len = header.payload_len();
        let total_size = FrameHeader::SIZE + payload_len;

        if bytes.len() < total_size {
            return Err(ProtocolError::FrameTruncated {
                expected: payload_len,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            });
        }

        let payload = Bytes::copy_from_slice(&bytes[FrameHeader::SIZE..total_size]);

        Ok(Self { header, payload })
    }

    /// Total encoded length (header + payload)
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }
}
