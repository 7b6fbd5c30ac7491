//! Aggregates the rendering submodules.
//!
//! - `projector`: pure snapshot → draw command projection
//! - `raster`: CPU rasteriser for projected scenes
//! - `text`: TrueType glyph coverage for the rasteriser
//! - `app`: winit window presenting the rasterised frame

pub mod app;
pub mod projector;
pub mod raster;
pub mod text;
