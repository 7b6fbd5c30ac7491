//! Dedicated audio thread that handles all audio operations.
//!
//! This prevents audio loading/seeking from blocking the presentation loop.
//! Load results and end-of-track are reported back on the session event queue.

use crate::system::bus::{AudioCommand, AudioEvent, AudioEventKind, SessionEvent, SystemBus};
use crossbeam_channel::RecvTimeoutError;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// How often the worker checks for the end of the track while idle.
const END_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct AudioWorker {
    _stream: Option<OutputStream>,
    stream_handle: Option<OutputStreamHandle>,
    sink: Option<Sink>,
    current_path: Option<PathBuf>,
    generation: u64,
    volume: f32,
    sample_rate: u32,
    channels: u16,
    position_counter: Arc<AtomicU64>,
    /// Set by Play, cleared by Pause/Stop and once the end was reported.
    playing: bool,
}

impl AudioWorker {
    fn new(bus: &SystemBus) -> Self {
        let (stream, stream_handle) = match OutputStream::try_default() {
            Ok((stream, handle)) => {
                log::info!("AUDIO: Device found, audio enabled");
                (Some(stream), Some(handle))
            }
            Err(e) => {
                log::warn!(
                    "AUDIO: No audio device found ({}), running in silent mode",
                    e
                );
                (None, None)
            }
        };

        Self {
            _stream: stream,
            stream_handle,
            sink: None,
            current_path: None,
            generation: 0,
            volume: 1.0,
            sample_rate: 44100,
            channels: 2,
            position_counter: bus.audio_position.clone(),
            playing: false,
        }
    }

    fn emit(&self, bus: &SystemBus, kind: AudioEventKind) {
        let _ = bus.events_tx.send(SessionEvent::Audio(AudioEvent {
            generation: self.generation,
            kind,
        }));
    }

    fn handle_command(&mut self, cmd: AudioCommand, bus: &SystemBus) {
        match cmd {
            AudioCommand::Load { path, generation } => {
                self.generation = generation;
                self.current_path = Some(path);
                match self.load_from_position(0.0, bus) {
                    Ok(duration) => self.emit(bus, AudioEventKind::Loaded { duration }),
                    Err(e) => {
                        log::error!("AUDIO: {}", e);
                        self.emit(bus, AudioEventKind::Error(e));
                    }
                }
            }
            AudioCommand::Play => {
                if let Some(sink) = &self.sink {
                    sink.play();
                    self.playing = true;
                }
            }
            AudioCommand::Pause => {
                if let Some(sink) = &self.sink {
                    sink.pause();
                }
                self.playing = false;
            }
            AudioCommand::Stop => {
                if let Some(sink) = self.sink.take() {
                    sink.stop();
                }
                self.playing = false;
                self.current_path = None;
                self.position_counter.store(0, Ordering::Relaxed);
            }
            AudioCommand::Seek { position_secs } => {
                self.seek_to(position_secs, bus);
            }
            AudioCommand::SetVolume { volume } => {
                self.volume = volume;
                if let Some(sink) = &self.sink {
                    sink.set_volume(volume);
                }
            }
        }
    }

    /// Reports the end of the track once.
    fn check_finished(&mut self, bus: &SystemBus) {
        if self.playing && self.sink.as_ref().is_some_and(|s| s.empty()) {
            self.playing = false;
            log::info!("AUDIO: Track finished");
            self.emit(bus, AudioEventKind::Ended);
        }
    }

    fn load_from_position(&mut self, position_secs: f32, bus: &SystemBus) -> Result<Option<f64>, String> {
        let Some(stream_handle) = &self.stream_handle else {
            return Err("no audio device".to_string());
        };

        let Some(path) = &self.current_path else {
            return Err("no track selected".to_string());
        };

        if let Some(sink) = self.sink.take() {
            sink.stop();
        }

        let file = File::open(path).map_err(|e| format!("cannot open {:?}: {}", path, e))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| format!("cannot decode {:?}: {}", path, e))?;

        self.sample_rate = source.sample_rate();
        self.channels = source.channels();
        let duration = source.total_duration().map(|d| d.as_secs_f64());

        // Update shared state
        bus.audio_sample_rate
            .store(self.sample_rate as u64, Ordering::Relaxed);
        bus.audio_channels
            .store(self.channels as u64, Ordering::Relaxed);

        let skip_duration = Duration::from_secs_f32(position_secs.max(0.0));
        let skipped_samples =
            (position_secs.max(0.0) as f64 * self.sample_rate as f64 * self.channels as f64) as u64;

        self.position_counter
            .store(skipped_samples, Ordering::Relaxed);

        let monitor = AudioMonitor {
            inner: source.skip_duration(skip_duration),
            position_counter: self.position_counter.clone(),
        };

        let sink = Sink::try_new(stream_handle).map_err(|e| format!("cannot create sink: {}", e))?;
        sink.set_volume(self.volume);
        sink.append(monitor);
        sink.pause();

        self.sink = Some(sink);
        log::info!("AUDIO: Loaded {:?} from {:.1}s", path, position_secs);
        Ok(duration)
    }

    fn seek_to(&mut self, position_secs: f32, bus: &SystemBus) {
        let was_playing = self.sink.as_ref().is_some_and(|s| !s.is_paused());

        if let Err(e) = self.load_from_position(position_secs, bus) {
            log::warn!("AUDIO: Seek failed: {}", e);
            return;
        }

        if was_playing && let Some(sink) = &self.sink {
            sink.play();
        }

        log::info!("AUDIO: Seeked to {:.1}s", position_secs);
    }
}

/// Counts samples as the sink pulls them, giving a sample-accurate position.
struct AudioMonitor<I> {
    inner: I,
    position_counter: Arc<AtomicU64>,
}

impl<I> Iterator for AudioMonitor<I>
where
    I: Iterator,
{
    type Item = I::Item;
    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next();
        if item.is_some() {
            self.position_counter.fetch_add(1, Ordering::Relaxed);
        }
        item
    }
}

impl<I> Source for AudioMonitor<I>
where
    I: Source,
    I::Item: rodio::Sample,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }
    fn channels(&self) -> u16 {
        self.inner.channels()
    }
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }
    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

/// Starts the dedicated audio thread.
pub fn start_audio_thread(bus: SystemBus) {
    thread::Builder::new()
        .name("Audio Thread".to_string())
        .spawn(move || {
            log::info!("AUDIO: Thread started");

            let mut worker = AudioWorker::new(&bus);

            loop {
                match bus.audio_cmd_rx.recv_timeout(END_POLL_INTERVAL) {
                    Ok(cmd) => worker.handle_command(cmd, &bus),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                worker.check_finished(&bus);
            }

            log::info!("AUDIO: Thread stopped");
        })
        .expect("Failed to spawn Audio thread");
}

