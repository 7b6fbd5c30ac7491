//! Definitions and constructors for hit window timing thresholds.

use crate::models::engine::constants::MISS_BUFFER_SECS;
use crate::models::stats::Judgement;
use thiserror::Error;

/// Rejected window triple; the windows must be positive and strictly nested.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("hit windows must satisfy 0 < perfect < great < good (got {perfect}, {great}, {good})")]
pub struct InvalidHitWindow {
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
}

/// Perfect / great / good tolerances, in seconds of absolute timing error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitWindow {
    perfect: f64,
    great: f64,
    good: f64,
}

impl HitWindow {
    /// Defaults used when no settings file provides windows.
    pub fn new() -> Self {
        Self {
            perfect: 0.05,
            great: 0.10,
            good: 0.15,
        }
    }

    /// Builds a window from custom values, enforcing `0 < perfect < great < good`.
    pub fn from_custom(perfect: f64, great: f64, good: f64) -> Result<Self, InvalidHitWindow> {
        let ordered = perfect.is_finite()
            && great.is_finite()
            && good.is_finite()
            && perfect > 0.0
            && perfect < great
            && great < good;

        if !ordered {
            return Err(InvalidHitWindow {
                perfect,
                great,
                good,
            });
        }

        Ok(Self {
            perfect,
            great,
            good,
        })
    }

    pub fn perfect(&self) -> f64 {
        self.perfect
    }

    pub fn great(&self) -> f64 {
        self.great
    }

    pub fn good(&self) -> f64 {
        self.good
    }

    /// Age past a note's time after which it is auto-missed.
    pub fn miss_threshold(&self) -> f64 {
        self.good + MISS_BUFFER_SECS
    }

    /// Returns `true` once `current_time - note_time` exceeds the miss threshold.
    pub fn is_expired(&self, age_secs: f64) -> bool {
        age_secs > self.miss_threshold()
    }

    /// Buckets an absolute timing error into a tier.
    ///
    /// Used for the local preview and for note tinting only; the server
    /// decides the real judgement. `None` means the note is still
    /// approaching (or already too late to earn a tier).
    pub fn judge(&self, timing_diff_secs: f64) -> Option<Judgement> {
        let abs_diff = timing_diff_secs.abs();

        if abs_diff <= self.perfect {
            Some(Judgement::Perfect)
        } else if abs_diff <= self.great {
            Some(Judgement::Great)
        } else if abs_diff <= self.good {
            Some(Judgement::Good)
        } else {
            None
        }
    }
}

impl Default for HitWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_buckets() {
        let window = HitWindow::new();
        assert_eq!(window.judge(0.0), Some(Judgement::Perfect));
        assert_eq!(window.judge(-0.05), Some(Judgement::Perfect));
        assert_eq!(window.judge(0.07), Some(Judgement::Great));
        assert_eq!(window.judge(-0.12), Some(Judgement::Good));
        assert_eq!(window.judge(0.2), None);
    }

    #[test]
    fn test_miss_threshold_adds_buffer() {
        let window = HitWindow::new();
        assert!((window.miss_threshold() - 0.25).abs() < 1e-12);
        assert!(!window.is_expired(0.2));
        assert!(window.is_expired(0.26));
    }

    #[test]
    fn test_from_custom_rejects_unordered_windows() {
        assert!(HitWindow::from_custom(0.1, 0.05, 0.15).is_err());
        assert!(HitWindow::from_custom(0.05, 0.05, 0.15).is_err());
        assert!(HitWindow::from_custom(0.0, 0.05, 0.15).is_err());
        assert!(HitWindow::from_custom(0.05, 0.1, f64::NAN).is_err());
        assert!(HitWindow::from_custom(0.05, 0.1, 0.15).is_ok());
    }

    fn ordered_windows() -> impl Strategy<Value = (f64, f64, f64)> {
        (0.001f64..0.1, 0.001f64..0.1, 0.001f64..0.1)
            .prop_map(|(p, d1, d2)| (p, p + d1, p + d1 + d2))
    }

    proptest! {
        #[test]
        fn prop_exact_perfect_delta_is_perfect((p, g, o) in ordered_windows()) {
            let window = HitWindow::from_custom(p, g, o).unwrap();
            prop_assert_eq!(window.judge(p), Some(Judgement::Perfect));
            prop_assert_eq!(window.judge(-p), Some(Judgement::Perfect));
        }

        #[test]
        fn prop_buffer_zone_is_untiered_but_not_expired(
            (p, g, o) in ordered_windows(),
            f in 0.01f64..=1.0,
        ) {
            let window = HitWindow::from_custom(p, g, o).unwrap();
            let delta = o + f * MISS_BUFFER_SECS;
            prop_assert_eq!(window.judge(delta), None);
            prop_assert!(!window.is_expired(delta));
        }

        #[test]
        fn prop_past_buffer_is_expired((p, g, o) in ordered_windows(), extra in 1e-6f64..1.0) {
            let window = HitWindow::from_custom(p, g, o).unwrap();
            prop_assert!(window.is_expired(window.miss_threshold() + extra));
        }
    }
}
