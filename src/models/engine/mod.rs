pub mod constants;
pub mod hit_window;
pub mod note;
pub mod playfield;

pub use constants::*;
pub use hit_window::{HitWindow, InvalidHitWindow};
pub use note::{Chart, ChartError, Note, load_chart};
pub use playfield::PlayfieldArea;
