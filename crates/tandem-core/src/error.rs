//! Error types for the tandem engine.
//!
//! Errors form a closed taxonomy inspected by [`ErrorKind`], never by
//! message text:
//!
//! - **Validation**: malformed participant set, message content or emoji
//! - **Conflict**: a participant is already in an active conversation
//! - **NotFound / State**: unknown or already-ended conversation
//! - **Authorization**: sender is not a participant
//! - **RateLimited**: message throttled, connection stays open
//!
//! Every error is recoverable at the connection level. The engine answers
//! the triggering connection with [`ChatError::user_message`], which never
//! includes ids of other connections.

use std::time::Duration;

use thiserror::Error;

use crate::ids::{ConnectionId, ConversationId};

/// Discriminant of [`ChatError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input
    Validation,
    /// Participant already matched elsewhere
    Conflict,
    /// Conversation does not exist or caller has none
    NotFound,
    /// Conversation exists but is no longer active
    State,
    /// Caller is not a participant
    Authorization,
    /// Caller exceeded the message rate
    RateLimited,
}

/// Rejected input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Message content absent from the request
    #[error("message content is missing")]
    Missing,

    /// Message longer than the limit, counted in code points
    #[error("message is {len} characters, maximum is {max}")]
    TooLong {
        /// Length of the rejected message
        len: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Message empty or whitespace only
    #[error("message is empty")]
    Empty,

    /// Too many consecutive identical characters
    #[error("message repeats a character more than {max} times in a row")]
    RepeatedCharacters {
        /// Maximum allowed run length
        max: usize,
    },

    /// Too many consecutive identical words
    #[error("message repeats a word more than {max} times in a row")]
    RepeatedWords {
        /// Maximum allowed run length
        max: usize,
    },

    /// Run of combining marks long enough to be glyph stacking abuse
    #[error("message contains too many consecutive combining marks")]
    ExcessiveMarks,

    /// Character outside letters, numbers, punctuation, separators, symbols
    /// and marks
    #[error("message contains disallowed characters")]
    InvalidCharacters,

    /// A conversation needs exactly two participants
    #[error("conversation needs exactly 2 participants, got {0}")]
    ParticipantCount(usize),

    /// Both participant slots name the same connection
    #[error("connection {0} cannot be paired with itself")]
    DuplicateParticipant(ConnectionId),

    /// Conversation id that is not in the server's id format
    #[error("malformed conversation id")]
    InvalidConversationId,

    /// Reaction emoji empty, too long or containing whitespace
    #[error("invalid reaction emoji")]
    InvalidEmoji,
}

impl ValidationError {
    fn user_message(&self) -> &'static str {
        match self {
            Self::Missing => "Message content is invalid",
            Self::TooLong { .. } => "Message must not exceed 1000 characters",
            Self::Empty => "Message must not be empty",
            Self::RepeatedCharacters { .. } => "Message contains too many repeated characters",
            Self::RepeatedWords { .. } => "Message contains too many repeated words",
            Self::ExcessiveMarks => "Message contains too many diacritical marks",
            Self::InvalidCharacters => "Message contains invalid characters",
            Self::ParticipantCount(_) | Self::DuplicateParticipant(_) => {
                "Could not pair you with a partner"
            },
            Self::InvalidConversationId => "Conversation not found",
            Self::InvalidEmoji => "Invalid reaction",
        }
    }
}

/// Errors produced by the engine and its components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Input rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Participant already indexed to an active conversation
    #[error("connection {connection} is already in conversation {conversation}")]
    Conflict {
        /// Connection that is already matched
        connection: ConnectionId,
        /// Its current conversation
        conversation: ConversationId,
    },

    /// No conversation with this id
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),

    /// Caller is not in any active conversation
    #[error("connection {0} is not in a conversation")]
    NotMatched(ConnectionId),

    /// Conversation already ended
    #[error("conversation {0} is no longer active")]
    Inactive(ConversationId),

    /// Sender is not one of the two participants
    #[error("connection {sender} is not a participant of conversation {conversation}")]
    NotParticipant {
        /// Offending sender
        sender: ConnectionId,
        /// Conversation it tried to act in
        conversation: ConversationId,
    },

    /// Message window exhausted
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl ChatError {
    /// Category of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::ConversationNotFound(_) | Self::NotMatched(_) => ErrorKind::NotFound,
            Self::Inactive(_) => ErrorKind::State,
            Self::NotParticipant { .. } => ErrorKind::Authorization,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
        }
    }

    /// Returns true if the caller can sensibly retry the same request later.
    ///
    /// Conflicts resolve once the racing match settles and rate limits once
    /// the window resets. Everything else needs different input.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::RateLimited)
    }

    /// Text shown to the triggering connection.
    ///
    /// Generic on purpose: no ids or internal state are included.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.user_message(),
            Self::Conflict { .. } => "Could not pair you with a partner",
            Self::ConversationNotFound(_) => "Conversation not found",
            Self::NotMatched(_) => "You are not in a conversation",
            Self::Inactive(_) => "This conversation has ended",
            Self::NotParticipant { .. } => "You are not part of this conversation",
            Self::RateLimited { .. } => "You are sending messages too fast, please slow down",
        }
    }

    /// Whole seconds until a retry makes sense, rounded up
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => {
                let secs = retry_after.as_secs();
                Some(if retry_after.subsec_nanos() > 0 { secs + 1 } else { secs })
            },
            _ => None,
        }
    }
}
