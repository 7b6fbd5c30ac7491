//! Shared gameplay constants.
//!
//! Judgement, auto-miss and projection all read from here so the timing
//! windows and the visuals cannot drift apart.

/// Number of input lanes on the playfield.
pub const NUM_LANES: usize = 4;

/// Length of the pre-play countdown (seconds).
pub const COUNTDOWN_SECS: f64 = 5.0;

/// Extra time past the `good` window before a note is auto-missed (seconds).
pub const MISS_BUFFER_SECS: f64 = 0.1;

/// Tolerance used to match a server-confirmed note against the local set (seconds).
pub const NOTE_MATCH_EPSILON_SECS: f64 = 0.001;

/// Without audio backing, the chart ends this long after its last note (seconds).
pub const END_GRACE_SECS: f64 = 2.0;

/// How long the central judgement text stays visible (seconds).
pub const JUDGEMENT_FLASH_SECS: f64 = 0.6;

/// How long a lane glows after a confirmed hit (seconds).
pub const LANE_FLASH_SECS: f64 = 0.3;

/// How long a notification stays on screen (seconds).
pub const NOTIFICATION_SECS: f64 = 3.0;

// Playfield geometry (pixels).
pub const DEFAULT_MAX_PLAYFIELD_WIDTH: f32 = 400.0;
pub const JUDGEMENT_LINE_INSET: f32 = 120.0;
pub const JUDGEMENT_ZONE_HALF_HEIGHT: f32 = 25.0;
pub const NOTE_HEIGHT: f32 = 15.0;
pub const NOTE_MARGIN: f32 = 10.0;
