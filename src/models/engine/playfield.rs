//! Playfield layout derived from the window size.

use crate::models::engine::constants::{JUDGEMENT_LINE_INSET, NUM_LANES};

/// Geometry of the four-lane playfield, in window pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayfieldArea {
    /// Left edge of the playfield (it is centred horizontally).
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub lane_width: f32,
    /// Y coordinate of the judgement line.
    pub judgement_y: f32,
    pub window_width: u32,
    pub window_height: u32,
}

impl PlayfieldArea {
    /// Lays out a playfield no wider than `max_width` inside the window.
    pub fn new(window_width: u32, window_height: u32, max_width: f32) -> Self {
        let width = (window_width as f32).min(max_width).max(0.0);
        let height = window_height as f32;
        Self {
            x: ((window_width as f32 - width) / 2.0).floor(),
            width,
            height,
            lane_width: width / NUM_LANES as f32,
            judgement_y: height - JUDGEMENT_LINE_INSET,
            window_width,
            window_height,
        }
    }

    /// Left edge of the given lane.
    pub fn lane_x(&self, lane: usize) -> f32 {
        self.x + lane as f32 * self.lane_width
    }

    pub fn update_size(&mut self, width: u32, height: u32, max_width: f32) {
        *self = Self::new(width, height, max_width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playfield_is_capped_and_centred() {
        let area = PlayfieldArea::new(1280, 720, 400.0);
        assert_eq!(area.width, 400.0);
        assert_eq!(area.x, 440.0);
        assert_eq!(area.lane_width, 100.0);
        assert_eq!(area.judgement_y, 600.0);
        assert_eq!(area.lane_x(2), 640.0);
    }

    #[test]
    fn test_narrow_window_uses_full_width() {
        let area = PlayfieldArea::new(300, 500, 400.0);
        assert_eq!(area.x, 0.0);
        assert_eq!(area.width, 300.0);
        assert_eq!(area.lane_width, 75.0);
    }
}
