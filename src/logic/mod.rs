//! Game logic that runs outside the session state itself.
//!
//! - `game_loop`: the presentation loop and event-queue draining
//! - `scheduler`: generation-tagged deferred timers
//! - `audio` / `audio_thread`: playback commands and the dedicated audio thread

pub mod audio;
pub mod audio_thread;
pub mod game_loop;
pub mod scheduler;

pub use game_loop::{LoopStatus, PresentationLoop};
