//! Traits for session state management.
//!
//! Handlers never own their collaborators; each call gets a
//! [`SessionContext`] borrowing them from the presentation loop.

use crate::input::events::GameAction;
use crate::logic::audio::AudioBackend;
use crate::logic::scheduler::Scheduler;
use crate::net::ServerLink;
use crate::net::protocol::ClientEvent;

/// Collaborators a session handler may touch, plus the current wall-clock.
pub struct SessionContext<'a> {
    pub audio: &'a mut dyn AudioBackend,
    pub server: &'a mut dyn ServerLink,
    pub scheduler: &'a mut Scheduler,
    /// Wall-clock seconds from the loop's time source.
    pub now: f64,
}

impl SessionContext<'_> {
    /// Sends an event to the server. Failures are logged, never retried;
    /// returns whether the link accepted the event.
    pub fn emit(&mut self, event: ClientEvent) -> bool {
        match self.server.send(event) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("NET: Failed to send event: {}", e);
                false
            }
        }
    }
}

/// What the loop should do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Stay in the current session.
    None,
    /// Tear the session down and build a fresh one for the same chart.
    Restart,
    /// Tear the session down and close the application.
    Quit,
}

/// Trait for creating render-ready snapshots.
///
/// Snapshots are immutable captures of state handed to the projector.
pub trait Snapshot {
    /// The snapshot type produced.
    type Output;

    /// Creates an immutable snapshot for rendering. Timed overlays are
    /// evaluated against `now`, the loop's wall-clock.
    fn create_snapshot(&self, now: f64) -> Self::Output;
}

/// Trait for per-frame updates.
pub trait Update {
    /// Advances the state by one presentation frame.
    fn update(&mut self, ctx: &mut SessionContext) -> Transition;
}

/// Trait for handling game actions.
pub trait HandleAction {
    /// Handles a game action and returns any transition.
    fn handle_action(&mut self, action: &GameAction, ctx: &mut SessionContext) -> Transition;
}
