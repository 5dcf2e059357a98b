//! Idle conversation reaper.
//!
//! Ends conversations with no activity for `idle_timeout`, checked every
//! `poll_interval`. Idleness is a comparison against `last_activity` on each
//! sweep rather than a per-conversation timer, so a late or restarted reaper
//! still ends everything that is due.
//!
//! ## State Machine
//!
//! ```text
//!            start(now)              poll(now) >= next_tick
//!   Stopped ───────────▶ Running ◀──────────────────────┐
//!      ▲                    │ └──── sweep, reschedule ───┘
//!      └────── stop() ──────┘
//! ```
//!
//! `start` on a running reaper reschedules instead of double-running; `stop`
//! on a stopped reaper does nothing.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tandem_proto::{ServerEvent, events::server::ConversationTimeout};
use tracing::{debug, error, info};

use crate::{
    config::duration_secs,
    store::{Conversation, Store},
    transport::{Action, Transport},
};

/// Text sent with `conversation-timeout`
pub const TIMEOUT_MESSAGE: &str = "Conversation ended after 1 minute of inactivity";

/// Reaper timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReaperConfig {
    /// Inactivity after which a conversation is ended
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,
    /// Time between sweeps
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self { idle_timeout: Duration::from_secs(60), poll_interval: Duration::from_secs(10) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaperState {
    Stopped,
    Running { next_tick: Instant },
}

/// Result of one sweep
#[derive(Debug, Default)]
pub struct Sweep {
    /// Notifications for still-connected participants
    pub actions: Vec<Action>,
    /// Conversations ended by this sweep
    pub ended: Vec<Conversation>,
}

/// Periodic idle sweep over the store.
#[derive(Debug)]
pub struct Reaper {
    config: ReaperConfig,
    state: ReaperState,
}

impl Reaper {
    /// Create a stopped reaper
    #[must_use]
    pub fn new(config: ReaperConfig) -> Self {
        Self { config, state: ReaperState::Stopped }
    }

    /// Reaper timing
    #[must_use]
    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// Schedule the first sweep one poll interval from `now`.
    ///
    /// Restarting a running reaper reschedules it.
    pub fn start(&mut self, now: Instant) {
        if matches!(self.state, ReaperState::Running { .. }) {
            debug!("reaper restarted");
        } else {
            info!(
                idle_timeout = ?self.config.idle_timeout,
                poll_interval = ?self.config.poll_interval,
                "reaper started"
            );
        }
        self.state = ReaperState::Running { next_tick: now + self.config.poll_interval };
    }

    /// Cancel the schedule
    pub fn stop(&mut self) {
        if matches!(self.state, ReaperState::Running { .. }) {
            info!("reaper stopped");
        }
        self.state = ReaperState::Stopped;
    }

    /// Returns true while a sweep is scheduled
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state, ReaperState::Running { .. })
    }

    /// When the next sweep is due, `None` while stopped
    #[must_use]
    pub fn next_tick(&self) -> Option<Instant> {
        match self.state {
            ReaperState::Stopped => None,
            ReaperState::Running { next_tick } => Some(next_tick),
        }
    }

    /// Sweep if one is due at `now`, then schedule the next one.
    pub fn poll<T: Transport>(&mut self, now: Instant, store: &mut Store, transport: &T) -> Sweep {
        match self.state {
            ReaperState::Running { next_tick } if now >= next_tick => {
                self.state = ReaperState::Running { next_tick: now + self.config.poll_interval };
                self.sweep(now, store, transport)
            },
            _ => Sweep::default(),
        }
    }

    /// End every conversation idle at `now`.
    ///
    /// Each still-connected participant receives `conversation-timeout`
    /// before the conversation is ended. A conversation that cannot be ended
    /// is logged and skipped.
    pub fn sweep<T: Transport>(&self, now: Instant, store: &mut Store, transport: &T) -> Sweep {
        let mut sweep = Sweep::default();

        // Process uptime shorter than the timeout: nothing can be idle yet.
        let Some(threshold) = now.checked_sub(self.config.idle_timeout) else {
            return sweep;
        };

        let idle = store.find_idle(threshold);
        if !idle.is_empty() {
            debug!(count = idle.len(), "idle conversations found");
        }

        for conversation in idle {
            for participant in conversation.participants {
                if transport.is_connected(participant) {
                    sweep.actions.push(Action::Emit {
                        to: participant,
                        event: ServerEvent::ConversationTimeout(ConversationTimeout {
                            conversation_id: conversation.id.to_string(),
                            message: TIMEOUT_MESSAGE.to_string(),
                        }),
                    });
                }
            }

            if store.end_conversation(conversation.id) {
                sweep.actions.push(Action::DisbandGroup { group: conversation.id });
                info!(
                    conversation = %conversation.id,
                    idle_for = ?now.saturating_duration_since(conversation.last_activity),
                    "ended idle conversation"
                );
                sweep.ended.push(conversation);
            } else {
                error!(conversation = %conversation.id, "failed to end idle conversation");
            }
        }

        sweep
    }
}
