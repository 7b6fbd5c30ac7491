//! Render snapshots.
//!
//! A snapshot is an immutable capture of session state. The projector only
//! ever sees snapshots, so rendering cannot mutate the session.

use crate::models::engine::Note;
use crate::models::engine::constants::{NOTIFICATION_SECS, NUM_LANES};
use crate::models::stats::{GameResults, Judgement, StatsSnapshot};
use crate::state::game::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStatus {
    /// No track requested yet.
    None,
    Loading,
    Ready,
    /// Failed or timed out; the session runs on the wall-clock.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub expires_at: f64,
}

/// Short-lived user-facing messages.
#[derive(Debug, Clone, Default)]
pub struct Notifications {
    items: Vec<Notification>,
}

impl Notifications {
    pub fn push(&mut self, now: f64, level: NotificationLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NotificationLevel::Info => log::info!("NOTIFY: {}", message),
            NotificationLevel::Error => log::error!("NOTIFY: {}", message),
        }
        self.items.push(Notification {
            level,
            message,
            expires_at: now + NOTIFICATION_SECS,
        });
    }

    pub fn active(&self, now: f64) -> Vec<Notification> {
        self.items
            .iter()
            .filter(|n| n.expires_at > now)
            .cloned()
            .collect()
    }

    pub fn prune(&mut self, now: f64) {
        self.items.retain(|n| n.expires_at > now);
    }

    /// When the next live notification disappears.
    pub fn next_expiry(&self, now: f64) -> Option<f64> {
        self.items
            .iter()
            .map(|n| n.expires_at)
            .filter(|t| *t > now)
            .min_by(f64::total_cmp)
    }
}

/// Snapshot of gameplay state for rendering.
#[derive(Clone, Debug)]
pub struct GameplaySnapshot {
    pub phase: Phase,
    /// Playing, but the server has not confirmed the start yet.
    pub awaiting_start: bool,
    /// Chart-relative game time in seconds.
    pub current_time: f64,

    /// Notes still pending, in chart order.
    pub notes: Vec<Note>,
    pub lanes_pressed: [bool; NUM_LANES],
    pub lanes_flashing: [bool; NUM_LANES],

    /// Judgement text currently flashing.
    pub judgement: Option<Judgement>,
    pub stats: StatsSnapshot,

    pub song_title: String,
    /// Length of the song if known (seconds).
    pub duration: Option<f64>,
    pub audio: AudioStatus,

    pub notifications: Vec<Notification>,
    pub results: Option<GameResults>,
}

impl GameplaySnapshot {
    /// Snapshot shown before any chart is loaded.
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            awaiting_start: false,
            current_time: 0.0,
            notes: Vec::new(),
            lanes_pressed: [false; NUM_LANES],
            lanes_flashing: [false; NUM_LANES],
            judgement: None,
            stats: StatsSnapshot::new(),
            song_title: String::new(),
            duration: None,
            audio: AudioStatus::None,
            notifications: Vec::new(),
            results: None,
        }
    }
}
