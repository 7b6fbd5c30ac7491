//! TrueType glyph coverage for the CPU rasteriser.
//!
//! No font ships with the game. One is read from `display.font`, or from a
//! handful of common system locations.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

use crate::render::projector::TextAnchor;

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

pub struct GlyphPainter {
    font: FontVec,
}

impl GlyphPainter {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font =
            FontVec::try_from_vec(data).map_err(|e| anyhow!("failed to parse font data: {e}"))?;
        Ok(Self { font })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| anyhow!("cannot read {path:?}: {e}"))?;
        Self::from_bytes(data)
    }

    /// The configured font if it loads, otherwise the first system font
    /// that does. `None` means text stays out of the frame.
    pub fn discover(configured: Option<&Path>) -> Option<Self> {
        let candidates: Vec<PathBuf> = configured
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
            .collect();
        Self::first_loadable(&candidates)
    }

    fn first_loadable(candidates: &[PathBuf]) -> Option<Self> {
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(painter) => {
                    log::info!("RENDER: Using font {:?}", path);
                    return Some(painter);
                }
                Err(e) => log::warn!("RENDER: {}", e),
            }
        }
        log::warn!("RENDER: No usable font found, text goes to the window title");
        None
    }

    /// Advance width of `text` at `size` pixels.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut prev = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    /// Lays `text` out on the baseline at `y` and reports every covered
    /// pixel as `(x, y, coverage)`. Pixels may fall outside any buffer.
    pub fn paint(
        &self,
        text: &str,
        (x, y): (f32, f32),
        size: f32,
        anchor: TextAnchor,
        mut plot: impl FnMut(i32, i32, f32),
    ) {
        let scale = PxScale::from(size);
        let scaled = self.font.as_scaled(scale);

        let mut cursor = match anchor {
            TextAnchor::Left => x,
            TextAnchor::Center => x - self.measure(text, size) / 2.0,
            TextAnchor::Right => x - self.measure(text, size),
        };
        let mut prev = None;

        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = prev {
                cursor += scaled.kern(prev, id);
            }

            let glyph = id.with_scale_and_position(scale, point(cursor, y));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                let (gx, gy) = (bounds.min.x as i32, bounds.min.y as i32);
                outlined.draw(|px, py, coverage| {
                    plot(gx + px as i32, gy + py as i32, coverage);
                });
            }

            cursor += scaled.h_advance(id);
            prev = Some(id);
        }
    }
}
