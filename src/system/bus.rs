//! Shared channel infrastructure between system threads.
//!
//! Every asynchronous source (keyboard, audio thread, server link, chart
//! loader) pushes into one session event queue. The presentation loop drains
//! that queue before each tick, so all state changes happen on one thread.

use crate::input::events::GameAction;
use crate::models::engine::{Chart, ChartError};
use crate::net::protocol::ServerEvent;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Commands sent to the dedicated audio thread.
#[derive(Debug, Clone)]
pub enum AudioCommand {
    /// Load an audio file, paused at 0. Replies carry `generation`.
    Load { path: PathBuf, generation: u64 },
    /// Start playback.
    Play,
    /// Pause playback.
    Pause,
    /// Stop and release the current track.
    Stop,
    /// Seek to a position (in seconds).
    Seek { position_secs: f32 },
    /// Change volume level.
    SetVolume { volume: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioEventKind {
    Loaded { duration: Option<f64> },
    Error(String),
    /// Playback reached the end of the track.
    Ended,
}

/// Notification from the audio thread about the track loaded for `generation`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEvent {
    pub generation: u64,
    pub kind: AudioEventKind,
}

/// Everything the presentation loop reacts to between ticks.
#[derive(Debug)]
pub enum SessionEvent {
    Input(GameAction),
    Server(ServerEvent),
    Audio(AudioEvent),
    ChartLoaded {
        path: PathBuf,
        result: Result<Chart, ChartError>,
    },
}

/// Aggregates the cross-thread communication channels.
#[derive(Clone)]
pub struct SystemBus {
    /// Window / audio / network / loader → Loop: session events.
    pub events_tx: Sender<SessionEvent>,
    pub events_rx: Receiver<SessionEvent>,

    /// Loop → Audio: audio commands.
    pub audio_cmd_tx: Sender<AudioCommand>,
    pub audio_cmd_rx: Receiver<AudioCommand>,

    /// Shared audio position in samples.
    /// Written by the audio thread, read by the loop.
    pub audio_position: Arc<AtomicU64>,

    /// Current audio sample rate.
    pub audio_sample_rate: Arc<AtomicU64>,

    /// Number of audio channels.
    pub audio_channels: Arc<AtomicU64>,
}

impl SystemBus {
    /// Creates a new system bus with all channels initialized.
    pub fn new() -> Self {
        let (events_tx, events_rx) = unbounded();
        let (audio_cmd_tx, audio_cmd_rx) = unbounded();

        Self {
            events_tx,
            events_rx,
            audio_cmd_tx,
            audio_cmd_rx,
            audio_position: Arc::new(AtomicU64::new(0)),
            audio_sample_rate: Arc::new(AtomicU64::new(44100)),
            audio_channels: Arc::new(AtomicU64::new(2)),
        }
    }
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}
