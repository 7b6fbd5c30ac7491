//! Audio manager that sends commands to the dedicated audio thread.
//!
//! This module provides a non-blocking interface for controlling audio
//! playback from the presentation loop.

use crate::system::bus::{AudioCommand, SystemBus};
use crossbeam_channel::Sender;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Playback controls the session relies on.
///
/// Load results arrive asynchronously as `SessionEvent::Audio`; callers must
/// cope with a backend that never reports back.
pub trait AudioBackend {
    fn load(&mut self, path: &Path, generation: u64);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, position_seconds: f64);
    fn set_volume(&mut self, volume: f32);
    fn position_seconds(&self) -> f64;
}

/// Wrapper for sending commands to the audio thread.
///
/// The `AudioManager` does not perform audio operations directly.
/// Instead, it sends commands through a channel to a dedicated audio thread.
pub struct AudioManager {
    cmd_tx: Sender<AudioCommand>,
    position: Arc<AtomicU64>,
    sample_rate: Arc<AtomicU64>,
    channels: Arc<AtomicU64>,
}

impl AudioManager {
    /// Creates a new audio manager connected to the system bus.
    pub fn new(bus: &SystemBus) -> Self {
        Self {
            cmd_tx: bus.audio_cmd_tx.clone(),
            position: bus.audio_position.clone(),
            sample_rate: bus.audio_sample_rate.clone(),
            channels: bus.audio_channels.clone(),
        }
    }

    fn send(&self, cmd: AudioCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            log::warn!("AUDIO: Audio thread is gone, command dropped");
        }
    }
}

impl AudioBackend for AudioManager {
    fn load(&mut self, path: &Path, generation: u64) {
        self.send(AudioCommand::Load {
            path: path.to_path_buf(),
            generation,
        });
    }

    fn play(&mut self) {
        self.send(AudioCommand::Play);
    }

    fn pause(&mut self) {
        self.send(AudioCommand::Pause);
    }

    fn stop(&mut self) {
        self.send(AudioCommand::Stop);
    }

    fn seek(&mut self, position_seconds: f64) {
        self.send(AudioCommand::Seek {
            position_secs: position_seconds as f32,
        });
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(AudioCommand::SetVolume { volume });
    }

    /// The position is calculated from the sample count shared atomically
    /// with the audio thread.
    fn position_seconds(&self) -> f64 {
        let samples = self.position.load(Ordering::Relaxed) as f64;
        let sample_rate = self.sample_rate.load(Ordering::Relaxed).max(1) as f64;
        let channels = self.channels.load(Ordering::Relaxed).max(1) as f64;

        samples / (sample_rate * channels)
    }
}

/// Scriptable backend for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct FakeAudio(std::rc::Rc<std::cell::RefCell<FakeAudioState>>);

#[cfg(test)]
#[derive(Debug, Default)]
pub struct FakeAudioState {
    pub loaded: Option<(std::path::PathBuf, u64)>,
    pub playing: bool,
    pub stopped: bool,
    pub position: f64,
    pub volume: f32,
}

#[cfg(test)]
impl FakeAudio {
    pub fn state(&self) -> std::cell::RefMut<'_, FakeAudioState> {
        self.0.borrow_mut()
    }
}

#[cfg(test)]
impl AudioBackend for FakeAudio {
    fn load(&mut self, path: &Path, generation: u64) {
        let mut state = self.0.borrow_mut();
        state.loaded = Some((path.to_path_buf(), generation));
        state.stopped = false;
        state.playing = false;
    }

    fn play(&mut self) {
        self.0.borrow_mut().playing = true;
    }

    fn pause(&mut self) {
        self.0.borrow_mut().playing = false;
    }

    fn stop(&mut self) {
        let mut state = self.0.borrow_mut();
        state.playing = false;
        state.stopped = true;
        state.position = 0.0;
    }

    fn seek(&mut self, position_seconds: f64) {
        self.0.borrow_mut().position = position_seconds;
    }

    fn set_volume(&mut self, volume: f32) {
        self.0.borrow_mut().volume = volume;
    }

    fn position_seconds(&self) -> f64 {
        self.0.borrow().position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_sample_counter() {
        let bus = SystemBus::new();
        let manager = AudioManager::new(&bus);

        bus.audio_sample_rate.store(48000, Ordering::Relaxed);
        bus.audio_channels.store(2, Ordering::Relaxed);
        bus.audio_position.store(48000 * 2 * 3, Ordering::Relaxed);

        assert!((manager.position_seconds() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_commands_reach_the_audio_channel() {
        let bus = SystemBus::new();
        let mut manager = AudioManager::new(&bus);

        manager.load(Path::new("song.ogg"), 7);
        manager.play();

        assert!(matches!(
            bus.audio_cmd_rx.try_recv(),
            Ok(AudioCommand::Load { generation: 7, .. })
        ));
        assert!(matches!(bus.audio_cmd_rx.try_recv(), Ok(AudioCommand::Play)));
    }
}
