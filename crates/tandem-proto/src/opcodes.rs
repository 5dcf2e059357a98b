//! Operation codes for tandem frames.
//!
//! Opcodes identify which event a frame carries. They are organized into
//! ranges by direction so a router can reject misdirected frames by checking
//! only the high byte.
//!
//! # Opcode Ranges
//!
//! - `0x0100-0x01FF`: Client requests
//! - `0x0200-0x02FF`: Server notifications

/// Frame operation codes
///
/// # Representation
///
/// Opcodes are serialized as Big Endian `u16` values in the frame header.
/// The `#[repr(u16)]` ensures stable numeric values for wire compatibility.
///
/// Unknown values are never mapped to a default variant: [`Opcode::from_u16`]
/// returns `None` and the frame must be rejected with
/// [`ProtocolError::InvalidOpcode`](crate::ProtocolError::InvalidOpcode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    // Client requests (0x0100-0x01FF)
    /// Send a chat message to the current partner
    SendMessage = 0x0101,
    /// React to a message in the current conversation
    AddReaction = 0x0102,
    /// Leave the current partner (if any) and wait for a new one
    FindNewPartner = 0x0103,

    // Server notifications (0x0200-0x02FF)
    /// Connection entered the waiting queue
    Waiting = 0x0201,
    /// Connection was paired with a partner
    Matched = 0x0202,
    /// A message was relayed in the conversation
    ReceiveMessage = 0x0203,
    /// A reaction was relayed in the conversation
    ReceiveReaction = 0x0204,
    /// The partner left
    PartnerDisconnected = 0x0205,
    /// The conversation was ended for inactivity
    ConversationTimeout = 0x0206,
    /// Periodic presence statistics
    UserStats = 0x0207,
    /// Request failed
    Error = 0x02FF,
}

impl Opcode {
    const CLIENT_RANGE: u16 = 0x0100;
    const SERVER_RANGE: u16 = 0x0200;

    /// Convert to raw u16 value
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Convert from raw u16 value
    ///
    /// Returns `None` if the value doesn't correspond to a known opcode.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0101 => Some(Self::SendMessage),
            0x0102 => Some(Self::AddReaction),
            0x0103 => Some(Self::FindNewPartner),

            0x0201 => Some(Self::Waiting),
            0x0202 => Some(Self::Matched),
            0x0203 => Some(Self::ReceiveMessage),
            0x0204 => Some(Self::ReceiveReaction),
            0x0205 => Some(Self::PartnerDisconnected),
            0x0206 => Some(Self::ConversationTimeout),
            0x0207 => Some(Self::UserStats),
            0x02FF => Some(Self::Error),

            _ => None,
        }
    }

    /// Returns true for opcodes a client may send.
    #[must_use]
    pub const fn is_client_request(self) -> bool {
        self.to_u16() & 0xFF00 == Self::CLIENT_RANGE
    }

    /// Returns true for opcodes only the server may send.
    #[must_use]
    pub const fn is_server_notification(self) -> bool {
        self.to_u16() & 0xFF00 == Self::SERVER_RANGE
    }

    /// Event name used in logs (matches the names clients subscribe to).
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::SendMessage => "send-message",
            Self::AddReaction => "add-reaction",
            Self::FindNewPartner => "find-new-partner",
            Self::Waiting => "waiting",
            Self::Matched => "matched",
            Self::ReceiveMessage => "receive-message",
            Self::ReceiveReaction => "receive-reaction",
            Self::PartnerDisconnected => "partner-disconnected",
            Self::ConversationTimeout => "conversation-timeout",
            Self::UserStats => "user-stats",
            Self::Error => "error",
        }
    }
}
