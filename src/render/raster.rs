//! CPU rasteriser for projected scenes.
//!
//! Pixels are `0xAARRGGBB`, the layout softbuffer presents. Text needs a
//! [`GlyphPainter`]; without one, text commands are skipped.

use crate::render::projector::{Color, DrawCommand, Scene};
use crate::render::text::GlyphPainter;

#[inline(always)]
fn pack_rgba(c: Color) -> u32 {
    let channel = |x: f32| (x.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    (channel(c[3]) << 24) | (channel(c[0]) << 16) | (channel(c[1]) << 8) | channel(c[2])
}

#[inline(always)]
fn blend(dst: u32, c: Color) -> u32 {
    let a = c[3].clamp(0.0, 1.0);
    if a >= 1.0 {
        return pack_rgba(c);
    }

    let mix = |shift: u32, src: f32| {
        let d = ((dst >> shift) & 0xFF) as f32 / 255.0;
        let v = src.clamp(0.0, 1.0) * a + d * (1.0 - a);
        ((v * 255.0 + 0.5) as u32) << shift
    };
    0xFF00_0000 | mix(16, c[0]) | mix(8, c[1]) | mix(0, c[2])
}

/// Draws `scene` into `buffer`, which holds `width * height` pixels.
///
/// Returns the number of rectangles and text runs drawn.
pub fn rasterize(
    scene: &Scene,
    buffer: &mut [u32],
    width: usize,
    height: usize,
    font: Option<&GlyphPainter>,
) -> usize {
    if width == 0 || height == 0 || buffer.len() < width * height {
        return 0;
    }

    let mut drawn = 0;
    for command in &scene.commands {
        match command {
            DrawCommand::Clear(color) => buffer[..width * height].fill(pack_rgba(*color)),
            DrawCommand::Rect { x, y, w, h, color } => {
                if fill_rect(buffer, width, height, (*x, *y, *w, *h), *color) {
                    drawn += 1;
                }
            }
            DrawCommand::Text {
                x,
                y,
                size,
                anchor,
                color,
                text,
                ..
            } => {
                let Some(font) = font else { continue };
                if color[3] <= 0.0 || text.is_empty() {
                    continue;
                }
                font.paint(text, (*x, *y), *size, *anchor, |px, py, coverage| {
                    if px < 0 || py < 0 || px as usize >= width || py as usize >= height {
                        return;
                    }
                    let pixel = &mut buffer[py as usize * width + px as usize];
                    let mut tinted = *color;
                    tinted[3] *= coverage.clamp(0.0, 1.0);
                    *pixel = blend(*pixel, tinted);
                });
                drawn += 1;
            }
        }
    }
    drawn
}

fn fill_rect(
    buffer: &mut [u32],
    width: usize,
    height: usize,
    (x, y, w, h): (f32, f32, f32, f32),
    color: Color,
) -> bool {
    if color[3] <= 0.0 || w <= 0.0 || h <= 0.0 {
        return false;
    }

    let x0 = x.round().max(0.0) as usize;
    let y0 = y.round().max(0.0) as usize;
    let x1 = ((x + w).round().max(0.0) as usize).min(width);
    let y1 = ((y + h).round().max(0.0) as usize).min(height);
    if x0 >= x1 || y0 >= y1 {
        return false;
    }

    for row in buffer[y0 * width..y1 * width].chunks_exact_mut(width) {
        for pixel in &mut row[x0..x1] {
            *pixel = blend(*pixel, color);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(commands: Vec<DrawCommand>) -> Scene {
        Scene {
            width: 4,
            height: 4,
            commands,
        }
    }

    #[test]
    fn test_clear_and_opaque_rect() {
        let mut buffer = vec![0u32; 16];
        let drawn = rasterize(
            &scene(vec![
                DrawCommand::Clear([0.0, 0.0, 0.0, 1.0]),
                DrawCommand::Rect {
                    x: 1.0,
                    y: 1.0,
                    w: 2.0,
                    h: 1.0,
                    color: [1.0, 0.0, 0.0, 1.0],
                },
            ]),
            &mut buffer,
            4,
            4,
            None,
        );

        assert_eq!(drawn, 1);
        assert_eq!(buffer[0], 0xFF00_0000);
        assert_eq!(buffer[5], 0xFFFF_0000);
        assert_eq!(buffer[6], 0xFFFF_0000);
        assert_eq!(buffer[7], 0xFF00_0000);
        assert_eq!(buffer[9], 0xFF00_0000);
    }

    #[test]
    fn test_rect_is_clipped_to_buffer() {
        let mut buffer = vec![0u32; 16];
        let drawn = rasterize(
            &scene(vec![DrawCommand::Rect {
                x: -10.0,
                y: 3.0,
                w: 100.0,
                h: 100.0,
                color: [1.0, 1.0, 1.0, 1.0],
            }]),
            &mut buffer,
            4,
            4,
            None,
        );
        assert_eq!(drawn, 1);
        assert!(buffer[12..].iter().all(|p| *p == 0xFFFF_FFFF));
        assert!(buffer[..12].iter().all(|p| *p == 0));
    }

    #[test]
    fn test_fully_offscreen_rect_is_skipped() {
        let mut buffer = vec![0u32; 16];
        let drawn = rasterize(
            &scene(vec![DrawCommand::Rect {
                x: 0.0,
                y: -50.0,
                w: 4.0,
                h: 15.0,
                color: [1.0, 1.0, 1.0, 1.0],
            }]),
            &mut buffer,
            4,
            4,
            None,
        );
        assert_eq!(drawn, 0);
    }

    #[test]
    fn test_alpha_blends_over_background() {
        let mut buffer = vec![0u32; 16];
        rasterize(
            &scene(vec![
                DrawCommand::Clear([0.0, 0.0, 0.0, 1.0]),
                DrawCommand::Rect {
                    x: 0.0,
                    y: 0.0,
                    w: 1.0,
                    h: 1.0,
                    color: [1.0, 1.0, 1.0, 0.5],
                },
            ]),
            &mut buffer,
            4,
            4,
            None,
        );
        assert_eq!(buffer[0], 0xFF80_8080);
    }

    #[test]
    fn test_text_without_font_leaves_buffer() {
        let mut buffer = vec![0u32; 16];
        let drawn = rasterize(
            &scene(vec![DrawCommand::Text {
                x: 0.0,
                y: 3.0,
                size: 4.0,
                anchor: crate::render::projector::TextAnchor::Left,
                role: crate::render::projector::TextRole::Hud,
                color: [1.0, 1.0, 1.0, 1.0],
                text: "3".to_string(),
            }]),
            &mut buffer,
            4,
            4,
            None,
        );
        assert_eq!(drawn, 0);
        assert!(buffer.iter().all(|p| *p == 0));
    }
}
