//! Oracle functions for scenario verification.
//!
//! Oracle functions run at the end of scenarios to verify global consistency.
//! They receive a snapshot of the entire world state and assert invariants.

use tandem_core::presence::Presence;

use crate::scenario::World;

/// Oracle function type.
///
/// Receives immutable reference to world state and returns:
/// - `Ok(())` if all invariants hold
/// - `Err(message)` if verification fails
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;

/// Create an oracle that verifies `a` and `b` share an active conversation.
pub fn paired(a: &'static str, b: &'static str) -> OracleFn {
    Box::new(move |world| match world.partner(a) {
        Some(partner) if partner == b => Ok(()),
        other => Err(format!("expected {a} paired with {b}, found {other:?}")),
    })
}

/// Create an oracle that verifies `actor` sits in the waiting queue.
pub fn waiting(actor: &'static str) -> OracleFn {
    Box::new(move |world| {
        if world.is_waiting(actor) && world.conversation(actor).is_none() {
            Ok(())
        } else {
            Err(format!("expected {actor} waiting"))
        }
    })
}

/// Create an oracle that verifies `actor` received at least one `event`.
pub fn received(actor: &'static str, event: &'static str) -> OracleFn {
    Box::new(move |world| {
        if world.count(actor, event) > 0 {
            Ok(())
        } else {
            Err(format!("{actor} never received {event}: {:?}", world.event_names(actor)))
        }
    })
}

/// Create an oracle that verifies queue, store and presence agree.
///
/// - Nobody is both queued and in an active conversation.
/// - Queued connections are live and tracked as `Waiting`.
/// - Connections in an active conversation are tracked as `Matched`.
/// - The participant index holds exactly two entries per active conversation.
pub fn consistent() -> OracleFn {
    Box::new(|world| {
        for actor in world.actors() {
            let in_conversation = world.conversation(actor).is_some();

            if world.is_waiting(actor) {
                if in_conversation {
                    return Err(format!("{actor} is queued while in a conversation"));
                }
                if !world.is_connected(actor) {
                    return Err(format!("{actor} is queued after disconnecting"));
                }
                if world.presence(actor) != Some(Presence::Waiting) {
                    return Err(format!("{actor} queued with presence {:?}", world.presence(actor)));
                }
            }

            if in_conversation && world.presence(actor) != Some(Presence::Matched) {
                return Err(format!("{actor} matched with presence {:?}", world.presence(actor)));
            }

            if !world.is_connected(actor) && world.presence(actor).is_some() {
                return Err(format!("{actor} disconnected but still tracked"));
            }
        }

        let stats = world.stats().store;
        if stats.active_participants != 2 * stats.active_conversations {
            return Err(format!(
                "participant index has {} entries for {} active conversations",
                stats.active_participants, stats.active_conversations
            ));
        }

        Ok(())
    })
}

/// Wrap an ad-hoc verification closure.
pub fn check(f: impl FnOnce(&World) -> Result<(), String> + 'static) -> OracleFn {
    Box::new(f)
}

/// Combine multiple oracles into one.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in oracles {
            oracle(world)?;
        }
        Ok(())
    })
}
