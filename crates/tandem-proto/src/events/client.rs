//! Client request bodies.

use serde::{Deserialize, Serialize};

/// Chat message sent to the current partner.
///
/// Content is untrusted: the server validates and sanitizes it before
/// storing or relaying. A body without content decodes to `None` and is
/// rejected by validation rather than by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Raw message text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Emoji reaction to a message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReaction {
    /// Conversation the reacted message belongs to
    pub conversation_id: String,
    /// Client-side index of the reacted message
    pub message_index: u32,
    /// Reaction emoji
    pub emoji: String,
}
