//! Server notification bodies.

use serde::{Deserialize, Serialize};

/// Pairing succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matched {
    /// New conversation (also the relay group name)
    pub conversation_id: String,
    /// The partner's connection id
    pub partner_id: String,
}

/// A message relayed to both participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveMessage {
    /// Sender's connection id
    pub sender_id: String,
    /// Sanitized message text
    pub content: String,
    /// Server receive time, milliseconds since the Unix epoch
    pub created_at: u64,
}

/// A reaction relayed to both participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveReaction {
    /// Client-side index of the reacted message
    pub message_index: u32,
    /// Reaction emoji
    pub emoji: String,
    /// Reacting connection id
    pub sender_id: String,
}

/// Conversation ended for inactivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTimeout {
    /// The ended conversation
    pub conversation_id: String,
    /// Human-readable explanation
    pub message: String,
}

/// Presence statistics, broadcast to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// Connected connections
    pub online_users: u64,
    /// Connections currently in the waiting queue
    pub waiting_users: u64,
}

/// Error notice for the triggering connection.
///
/// Messages MUST NOT contain internal details (ids of other connections,
/// stack traces). They are shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable error message
    pub message: String,
    /// Seconds before retrying makes sense (throttling only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}
