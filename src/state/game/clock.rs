//! Game clock: chart-relative time derived from audio or wall-clock.

use crate::models::engine::constants::COUNTDOWN_SECS;
use std::time::Instant;

/// Monotonic wall-clock in seconds since an arbitrary origin.
pub trait TimeSource {
    fn now(&self) -> f64;
}

pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven time source for deterministic tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct ManualTime(std::rc::Rc<std::cell::Cell<f64>>);

#[cfg(test)]
impl ManualTime {
    pub fn set(&self, secs: f64) {
        self.0.set(secs);
    }

    pub fn advance(&self, secs: f64) {
        self.0.set(self.0.get() + secs);
    }
}

#[cfg(test)]
impl TimeSource for ManualTime {
    fn now(&self) -> f64 {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClockMode {
    /// Position does not move (pre-start, paused, awaiting the server).
    Frozen(f64),
    /// `-COUNTDOWN_SECS` at `anchor`, clamped to 0.
    Countdown { anchor: f64 },
    /// 0 at `anchor`; audio position overrides when it is available.
    Playing { anchor: f64 },
}

/// Chart-relative game clock.
///
/// Each mode change re-anchors; within a mode the sampled value never
/// decreases.
#[derive(Debug, Clone)]
pub struct ClockSource {
    mode: ClockMode,
    last: f64,
}

impl ClockSource {
    /// A clock parked at the start of the countdown.
    pub fn new() -> Self {
        Self {
            mode: ClockMode::Frozen(-COUNTDOWN_SECS),
            last: -COUNTDOWN_SECS,
        }
    }

    pub fn start_countdown(&mut self, now: f64) {
        self.set_mode(ClockMode::Countdown { anchor: now }, -COUNTDOWN_SECS);
    }

    /// Anchors the play clock so that `now` is chart time 0.
    pub fn start_playing(&mut self, now: f64) {
        self.set_mode(ClockMode::Playing { anchor: now }, 0.0);
    }

    pub fn hold(&mut self, position: f64) {
        self.set_mode(ClockMode::Frozen(position), position);
    }

    /// Freezes at the last sampled position.
    pub fn pause(&mut self) {
        self.hold(self.last);
    }

    /// Continues from the stored position.
    pub fn resume(&mut self, now: f64) {
        let position = self.last;
        self.set_mode(
            ClockMode::Playing {
                anchor: now - position,
            },
            position,
        );
    }

    /// Samples the clock. `audio` is the audio backend's position, passed only
    /// while audio is loaded and playing.
    pub fn sample(&mut self, now: f64, audio: Option<f64>) -> f64 {
        let raw = match &mut self.mode {
            ClockMode::Frozen(position) => *position,
            ClockMode::Countdown { anchor } => (-COUNTDOWN_SECS + (now - *anchor)).min(0.0),
            ClockMode::Playing { anchor } => match audio {
                Some(position) => {
                    // Keep the wall-clock fallback aligned with the audio.
                    *anchor = now - position;
                    position
                }
                None => now - *anchor,
            },
        };

        self.last = self.last.max(raw);
        self.last
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        !matches!(self.mode, ClockMode::Frozen(_))
    }

    fn set_mode(&mut self, mode: ClockMode, position: f64) {
        self.mode = mode;
        self.last = position;
    }
}

impl Default for ClockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_is_monotonic_and_reaches_zero() {
        let mut clock = ClockSource::new();
        clock.start_countdown(10.0);

        let mut previous = f64::NEG_INFINITY;
        let mut now = 10.0;
        while now <= 10.0 + COUNTDOWN_SECS + 0.5 {
            let t = clock.sample(now, None);
            assert!(t >= previous);
            assert!(t <= 0.0);
            previous = t;
            now += 1.0 / 60.0;
        }
        assert_eq!(clock.sample(10.0 + COUNTDOWN_SECS, None), 0.0);
    }

    #[test]
    fn test_countdown_starts_at_minus_five() {
        let mut clock = ClockSource::new();
        assert_eq!(clock.sample(3.0, None), -COUNTDOWN_SECS);
        clock.start_countdown(3.0);
        assert_eq!(clock.sample(3.0, None), -COUNTDOWN_SECS);
        assert!((clock.sample(5.5, None) + 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_playing_without_audio_uses_wall_clock() {
        let mut clock = ClockSource::new();
        clock.start_playing(100.0);
        assert!((clock.sample(101.25, None) - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_playing_prefers_audio_position() {
        let mut clock = ClockSource::new();
        clock.start_playing(100.0);
        assert_eq!(clock.sample(101.0, Some(0.98)), 0.98);
        // Falling back to wall-clock continues from the audio position.
        assert!((clock.sample(102.0, None) - 1.98).abs() < 1e-9);
    }

    #[test]
    fn test_audio_jitter_never_moves_backwards() {
        let mut clock = ClockSource::new();
        clock.start_playing(0.0);
        assert_eq!(clock.sample(1.0, Some(1.0)), 1.0);
        assert_eq!(clock.sample(1.01, Some(0.995)), 1.0);
    }

    #[test]
    fn test_paused_clock_is_frozen() {
        let mut clock = ClockSource::new();
        clock.start_playing(0.0);
        clock.sample(2.0, None);
        clock.pause();

        let a = clock.sample(5.0, None);
        let b = clock.sample(9.0, None);
        assert_eq!(a, b);
        assert_eq!(a, 2.0);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_resume_continues_from_stored_position() {
        let mut clock = ClockSource::new();
        clock.start_playing(0.0);
        clock.sample(2.0, None);
        clock.pause();
        clock.resume(30.0);
        assert!((clock.sample(30.5, None) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_manual_time_source() {
        let time = ManualTime::default();
        time.set(1.5);
        time.advance(0.5);
        assert_eq!(time.now(), 2.0);
    }
}
