//! One play-through of one chart.
//!
//! `PlaySession` is the explicit context object for everything a play
//! session owns: phase, note set, clock, latest stats and transient HUD state.
//! It is never reset field by field; restarting builds a new session with a
//! new generation.
//!
//! Handlers are split by event source:
//! - `input`: keyboard actions
//! - `server`: reconciliation with server replies
//! - `snapshot`: render snapshots
//! - this module: lifecycle, timers, audio events and the per-frame update

mod input;
mod server;
mod snapshot;

pub mod clock;
pub mod judge;
pub mod notes;
pub mod phase;

pub use clock::{ClockSource, SystemTimeSource, TimeSource};
pub use notes::NoteSet;
pub use phase::Phase;

use crate::logic::scheduler::{TimerId, TimerKind};
use crate::models::engine::Chart;
use crate::models::engine::constants::{COUNTDOWN_SECS, END_GRACE_SECS, NUM_LANES};
use crate::models::settings::{Settings, ToleranceConfig};
use crate::models::stats::{GameResults, Judgement, StatsSnapshot};
use crate::net::protocol::{ClientEvent, StartConfig};
use crate::shared::snapshot::{AudioStatus, NotificationLevel, Notifications};
use crate::state::traits::{SessionContext, Transition, Update};
use crate::system::bus::AudioEventKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-session options, frozen when the session is created.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub tolerance: ToleranceConfig,
    pub audio_dir: PathBuf,
    pub load_timeout: f64,
    pub debug_mode: bool,
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            tolerance: settings.tolerance_config(),
            audio_dir: settings.audio.audio_dir.clone(),
            load_timeout: settings.audio.load_timeout,
            debug_mode: settings.display.debug_mode,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

pub struct PlaySession {
    generation: u64,
    chart: Arc<Chart>,
    chart_path: PathBuf,
    audio_path: PathBuf,
    options: SessionOptions,

    phase: Phase,
    /// Playing, waiting for `game_started`. The clock holds at 0 meanwhile.
    awaiting_start_ack: bool,
    /// Local pause/resume requests the server has not confirmed yet.
    unacked_toggles: u32,
    end_requested: bool,

    notes: NoteSet,
    stats: StatsSnapshot,
    results: Option<GameResults>,

    clock: ClockSource,
    current_time: f64,
    /// Wall-clock of the last handler call.
    now: f64,

    audio: AudioStatus,
    /// Audio is loaded and currently driving the clock.
    audio_playing: bool,
    audio_duration: Option<f64>,

    countdown_timer: Option<TimerId>,
    load_timer: Option<TimerId>,

    judgement_flash: Option<(Judgement, f64)>,
    lane_flash_until: [f64; NUM_LANES],
    notifications: Notifications,
    last_debug_second: Option<i64>,
}

impl PlaySession {
    pub fn new(generation: u64, chart: Arc<Chart>, chart_path: PathBuf, options: SessionOptions) -> Self {
        let audio_path = chart.resolve_audio_path(&chart_path, &options.audio_dir);

        Self {
            generation,
            chart,
            chart_path,
            audio_path,
            options,
            phase: Phase::Idle,
            awaiting_start_ack: false,
            unacked_toggles: 0,
            end_requested: false,
            notes: NoteSet::new(),
            stats: StatsSnapshot::new(),
            results: None,
            clock: ClockSource::new(),
            current_time: -COUNTDOWN_SECS,
            now: 0.0,
            audio: AudioStatus::None,
            audio_playing: false,
            audio_duration: None,
            countdown_timer: None,
            load_timer: None,
            judgement_flash: None,
            lane_flash_until: [f64::NEG_INFINITY; NUM_LANES],
            notifications: Notifications::default(),
            last_debug_second: None,
        }
    }

    /// Idle → WaitingForStart: preview the notes and load the audio paused.
    pub fn begin(&mut self, ctx: &mut SessionContext) {
        self.now = ctx.now;
        if !self.transition(Phase::WaitingForStart) {
            return;
        }

        self.notes.load(self.chart.notes.clone());
        self.current_time = self.clock.sample(ctx.now, None);

        self.audio = AudioStatus::Loading;
        ctx.audio.load(&self.audio_path, self.generation);
        self.load_timer = Some(ctx.scheduler.schedule(
            self.generation,
            ctx.now + self.options.load_timeout,
            TimerKind::AudioLoadTimeout,
        ));

        log::info!(
            "SESSION: #{} ready: '{}' ({} notes, audio {:?})",
            self.generation,
            self.chart.song_title,
            self.notes.len(),
            self.audio_path
        );
    }

    /// Releases everything this session armed. The session must be dropped
    /// afterwards.
    pub fn teardown(&mut self, ctx: &mut SessionContext) {
        let cancelled = ctx.scheduler.cancel_generation(self.generation);
        ctx.audio.stop();
        self.audio_playing = false;
        self.countdown_timer = None;
        self.load_timer = None;
        log::info!(
            "SESSION: #{} torn down in phase {} ({} timers cancelled)",
            self.generation,
            self.phase,
            cancelled
        );
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_awaiting_start(&self) -> bool {
        self.awaiting_start_ack
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn notes(&self) -> &NoteSet {
        &self.notes
    }

    pub fn stats(&self) -> &StatsSnapshot {
        &self.stats
    }

    pub fn results(&self) -> Option<&GameResults> {
        self.results.as_ref()
    }

    pub fn audio_status(&self) -> AudioStatus {
        self.audio
    }

    pub fn chart(&self) -> &Arc<Chart> {
        &self.chart
    }

    pub fn chart_path(&self) -> &Path {
        &self.chart_path
    }

    fn transition(&mut self, to: Phase) -> bool {
        if !self.phase.can_transition(to) {
            log::debug!("SESSION: Ignoring transition {} -> {}", self.phase, to);
            return false;
        }
        log::info!("SESSION: {} -> {}", self.phase, to);
        self.phase = to;
        true
    }

    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(self.now, level, message);
    }

    /// Truly playing: started and acknowledged by the server.
    fn is_live(&self) -> bool {
        self.phase == Phase::Playing && !self.awaiting_start_ack
    }

    fn sample_time(&mut self, ctx: &SessionContext) -> f64 {
        let audio = self.audio_playing.then(|| ctx.audio.position_seconds());
        self.current_time = self.clock.sample(ctx.now, audio);
        self.current_time
    }

    /// Removes expired notes and reports each one exactly once.
    fn report_misses(&mut self, ctx: &mut SessionContext) {
        let missed = judge::sweep_misses(
            &mut self.notes,
            &self.options.tolerance.hit_window,
            self.current_time,
        );

        for note in missed {
            log::debug!("LOGIC: Auto-miss lane {} at {:.3}s", note.lane, note.time);
            ctx.emit(ClientEvent::AutoMiss {
                lane: note.lane,
                note_time: note.time,
            });
        }
    }

    /// WaitingForStart → CountingDown.
    fn start_countdown(&mut self, ctx: &mut SessionContext) {
        if self.audio == AudioStatus::Loading {
            self.notify(NotificationLevel::Info, "Audio is still loading");
            return;
        }
        if !self.transition(Phase::CountingDown) {
            return;
        }

        self.clock.start_countdown(ctx.now);
        self.current_time = self.clock.sample(ctx.now, None);
        self.countdown_timer = Some(ctx.scheduler.schedule(
            self.generation,
            ctx.now + COUNTDOWN_SECS,
            TimerKind::CountdownElapsed,
        ));
    }

    /// Fired timer belonging to this session's generation.
    pub fn on_timer(&mut self, kind: TimerKind, ctx: &mut SessionContext) {
        self.now = ctx.now;
        match kind {
            TimerKind::CountdownElapsed => {
                self.countdown_timer = None;
                if !self.transition(Phase::Playing) {
                    return;
                }

                self.awaiting_start_ack = true;
                self.clock.hold(0.0);
                self.current_time = 0.0;
                let sent = ctx.emit(ClientEvent::StartGame {
                    chart_path: self.chart_path.to_string_lossy().into_owned(),
                    config: StartConfig::from(&self.options.tolerance),
                });
                if !sent {
                    self.notify(
                        NotificationLevel::Error,
                        "Cannot reach the judging server, restart to try again",
                    );
                }
            }
            TimerKind::AudioLoadTimeout => {
                self.load_timer = None;
                if self.audio == AudioStatus::Loading {
                    self.audio = AudioStatus::Unavailable;
                    self.notify(
                        NotificationLevel::Error,
                        "Audio load timed out, playing without audio",
                    );
                }
            }
        }
    }

    /// Audio event for this session's generation.
    pub fn on_audio_event(&mut self, kind: AudioEventKind, ctx: &mut SessionContext) {
        self.now = ctx.now;
        match kind {
            AudioEventKind::Loaded { duration } => {
                if self.audio != AudioStatus::Loading {
                    log::debug!("AUDIO: Late load result ignored");
                    return;
                }
                self.audio = AudioStatus::Ready;
                self.audio_duration = duration;
                if let Some(timer) = self.load_timer.take() {
                    ctx.scheduler.cancel(timer);
                }
                log::info!("AUDIO: Track ready ({:?}s)", duration);
            }
            AudioEventKind::Error(message) => {
                if self.audio != AudioStatus::Loading {
                    return;
                }
                self.audio = AudioStatus::Unavailable;
                if let Some(timer) = self.load_timer.take() {
                    ctx.scheduler.cancel(timer);
                }
                self.notify(
                    NotificationLevel::Error,
                    format!("Audio failed to load ({message}), playing without audio"),
                );
            }
            AudioEventKind::Ended => {
                if self.audio_playing && self.phase == Phase::Playing {
                    self.audio_playing = false;
                    self.request_end(ctx);
                }
            }
        }
    }

    /// Playing → Paused.
    fn pause(&mut self, ctx: &mut SessionContext) -> bool {
        if !self.is_live() || !self.transition(Phase::Paused) {
            return false;
        }
        self.sample_time(ctx);
        self.clock.pause();
        if self.audio_playing {
            ctx.audio.pause();
            self.audio_playing = false;
        }
        true
    }

    /// Paused → Playing, continuing from the stored position.
    fn resume(&mut self, ctx: &mut SessionContext) -> bool {
        if !self.transition(Phase::Playing) {
            return false;
        }
        self.clock.resume(ctx.now);
        if self.audio == AudioStatus::Ready {
            ctx.audio.play();
            self.audio_playing = true;
        }
        true
    }

    /// Playing/Paused → Ended and ask the server for final results.
    fn request_end(&mut self, ctx: &mut SessionContext) {
        if self.end_requested {
            return;
        }
        self.end_requested = true;
        self.finish(ctx);
        ctx.emit(ClientEvent::EndGame);
    }

    fn finish(&mut self, ctx: &mut SessionContext) {
        if !self.transition(Phase::Ended) {
            return;
        }
        if self.audio_playing {
            ctx.audio.pause();
            self.audio_playing = false;
        }
        log::info!(
            "SESSION: #{} ended at {:.2}s with {} notes pending",
            self.generation,
            self.current_time,
            self.notes.len()
        );
    }

    /// Without audio backing the chart ends shortly after its last note.
    fn check_chart_end(&mut self, ctx: &mut SessionContext) {
        if self.audio_playing || !self.notes.is_empty() {
            return;
        }
        if self.current_time > self.chart.last_note_time() + END_GRACE_SECS {
            self.request_end(ctx);
        }
    }

    fn debug_log(&mut self) {
        if !self.options.debug_mode {
            return;
        }
        let second = self.current_time.floor() as i64;
        if self.last_debug_second == Some(second) {
            return;
        }
        self.last_debug_second = Some(second);

        let upcoming: Vec<String> = self
            .notes
            .notes()
            .iter()
            .filter(|n| n.time >= self.current_time)
            .take(5)
            .map(|n| format!("{}@{:.2}", n.lane, n.time))
            .collect();
        log::debug!(
            "LOGIC: t={:.2}s, {} notes left, next: [{}]",
            self.current_time,
            self.notes.len(),
            upcoming.join(", ")
        );
    }
}

impl Update for PlaySession {
    fn update(&mut self, ctx: &mut SessionContext) -> Transition {
        self.now = ctx.now;
        self.notifications.prune(ctx.now);

        match self.phase {
            Phase::Playing if !self.awaiting_start_ack => {
                self.sample_time(ctx);
                self.report_misses(ctx);
                self.check_chart_end(ctx);
                self.debug_log();
            }
            Phase::Playing | Phase::WaitingForStart | Phase::CountingDown => {
                self.current_time = self.clock.sample(ctx.now, None);
            }
            Phase::Idle | Phase::Paused | Phase::Ended => {}
        }

        Transition::None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::logic::audio::FakeAudio;
    use crate::logic::scheduler::Scheduler;
    use crate::models::engine::Note;
    use crate::net::RecordingLink;

    /// Session plus the fakes it talks to.
    pub struct Harness {
        pub session: PlaySession,
        pub audio: FakeAudio,
        pub server: RecordingLink,
        pub scheduler: Scheduler,
        pub now: f64,
    }

    impl Harness {
        pub fn new(notes: Vec<Note>) -> Self {
            let chart = Chart {
                song_title: "Harness".to_string(),
                bpm: 120.0,
                audio_file: "harness.ogg".to_string(),
                notes,
                difficulty: None,
                lanes: Some(NUM_LANES),
                duration: None,
            };
            let session = PlaySession::new(
                1,
                Arc::new(chart),
                PathBuf::from("/charts/harness.json"),
                SessionOptions::default(),
            );
            Self {
                session,
                audio: FakeAudio::default(),
                server: RecordingLink::default(),
                scheduler: Scheduler::new(),
                now: 0.0,
            }
        }

        pub fn with<R>(&mut self, f: impl FnOnce(&mut PlaySession, &mut SessionContext) -> R) -> R {
            let mut ctx = SessionContext {
                audio: &mut self.audio,
                server: &mut self.server,
                scheduler: &mut self.scheduler,
                now: self.now,
            };
            f(&mut self.session, &mut ctx)
        }

        pub fn fire_due_timers(&mut self) {
            let generation = self.session.generation();
            for fired in self.scheduler.due(self.now) {
                if fired.generation == generation {
                    self.with(|s, ctx| s.on_timer(fired.kind, ctx));
                }
            }
        }

        pub fn tick(&mut self) {
            self.fire_due_timers();
            self.with(|s, ctx| s.update(ctx));
        }

        /// Drives the session to Playing with audio ready and the start acked.
        pub fn start_playing(&mut self) {
            self.with(|s, ctx| s.begin(ctx));
            self.with(|s, ctx| s.on_audio_event(AudioEventKind::Loaded { duration: Some(60.0) }, ctx));
            self.with(|s, ctx| s.start_countdown(ctx));
            self.now += COUNTDOWN_SECS;
            self.tick();
            self.with(|s, ctx| {
                s.on_server_event(
                    crate::net::protocol::ServerEvent::GameStarted {
                        chart_data: None,
                        start_time: None,
                    },
                    ctx,
                )
            });
            self.server.clear();
        }
    }

    #[test]
    fn test_begin_loads_preview_and_audio() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.with(|s, ctx| s.begin(ctx));

        assert_eq!(h.session.phase(), Phase::WaitingForStart);
        assert_eq!(h.session.notes().len(), 1);
        assert_eq!(h.session.audio_status(), AudioStatus::Loading);
        assert_eq!(h.audio.state().loaded.as_ref().map(|(_, g)| *g), Some(1));
        assert_eq!(h.scheduler.pending(), 1);
        assert_eq!(h.session.current_time(), -COUNTDOWN_SECS);
    }

    #[test]
    fn test_start_refused_while_audio_loading() {
        let mut h = Harness::new(vec![]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.start_countdown(ctx));
        assert_eq!(h.session.phase(), Phase::WaitingForStart);
    }

    #[test]
    fn test_countdown_emits_start_game_once() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.on_audio_event(AudioEventKind::Loaded { duration: None }, ctx));
        h.with(|s, ctx| s.start_countdown(ctx));
        assert_eq!(h.session.phase(), Phase::CountingDown);

        let mut previous = f64::NEG_INFINITY;
        for _ in 0..299 {
            h.now += 1.0 / 60.0;
            h.tick();
            assert!(h.session.current_time() >= previous);
            assert!(h.session.current_time() <= 0.0);
            previous = h.session.current_time();
        }
        assert_eq!(h.session.phase(), Phase::CountingDown);

        h.now += 1.0 / 30.0;
        h.tick();
        assert_eq!(h.session.phase(), Phase::Playing);
        assert!(h.session.is_awaiting_start());
        assert_eq!(h.session.current_time(), 0.0);

        let sent = h.server.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], ClientEvent::StartGame { .. }));
    }

    #[test]
    fn test_unreachable_server_is_notified_on_start() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.on_audio_event(AudioEventKind::Loaded { duration: None }, ctx));
        h.server.close();

        h.with(|s, ctx| s.start_countdown(ctx));
        h.now += COUNTDOWN_SECS;
        h.fire_due_timers();

        assert!(h.server.sent().is_empty());
        let active = h.session.notifications.active(h.now);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].level, NotificationLevel::Error);
    }

    #[test]
    fn test_audio_timeout_falls_back_to_wall_clock() {
        let mut h = Harness::new(vec![]);
        h.with(|s, ctx| s.begin(ctx));
        h.now += 10.5;
        h.tick();
        assert_eq!(h.session.audio_status(), AudioStatus::Unavailable);
        assert_eq!(h.session.notifications.active(h.now).len(), 1);

        // A late load result does not resurrect the audio.
        h.with(|s, ctx| s.on_audio_event(AudioEventKind::Loaded { duration: None }, ctx));
        assert_eq!(h.session.audio_status(), AudioStatus::Unavailable);
    }

    #[test]
    fn test_loaded_audio_cancels_timeout() {
        let mut h = Harness::new(vec![]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.on_audio_event(AudioEventKind::Loaded { duration: Some(3.0) }, ctx));
        assert_eq!(h.scheduler.pending(), 0);
        assert_eq!(h.session.audio_status(), AudioStatus::Ready);
    }

    #[test]
    fn test_sweep_reports_auto_miss_once() {
        let mut h = Harness::new(vec![Note::new(2, 1.0), Note::new(3, 1.05)]);
        h.start_playing();
        h.audio.state().position = 1.5;
        h.tick();
        h.tick();

        let misses: Vec<_> = h
            .server
            .sent()
            .into_iter()
            .filter(|e| matches!(e, ClientEvent::AutoMiss { .. }))
            .collect();
        assert_eq!(
            misses,
            vec![
                ClientEvent::AutoMiss { lane: 2, note_time: 1.0 },
                ClientEvent::AutoMiss { lane: 3, note_time: 1.05 },
            ]
        );
        assert!(h.session.notes().is_empty());
    }

    #[test]
    fn test_no_sweep_before_start_ack() {
        let mut h = Harness::new(vec![Note::new(0, -3.0)]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.on_audio_event(AudioEventKind::Loaded { duration: None }, ctx));
        h.with(|s, ctx| s.start_countdown(ctx));
        h.now += COUNTDOWN_SECS + 3.0;
        h.tick();
        h.tick();
        assert_eq!(h.session.notes().len(), 1);
    }

    #[test]
    fn test_audio_end_requests_results() {
        let mut h = Harness::new(vec![]);
        h.start_playing();
        h.with(|s, ctx| s.on_audio_event(AudioEventKind::Ended, ctx));
        assert_eq!(h.session.phase(), Phase::Ended);
        assert_eq!(h.server.sent(), vec![ClientEvent::EndGame]);
    }

    #[test]
    fn test_chart_end_without_audio() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.on_audio_event(AudioEventKind::Error("no audio device".into()), ctx));
        h.with(|s, ctx| s.start_countdown(ctx));
        h.now += COUNTDOWN_SECS;
        h.tick();
        h.with(|s, ctx| {
            s.on_server_event(
                crate::net::protocol::ServerEvent::GameStarted {
                    chart_data: None,
                    start_time: None,
                },
                ctx,
            )
        });

        h.now += 2.0;
        h.tick();
        assert_eq!(h.session.phase(), Phase::Playing);
        assert!(h.session.notes().is_empty());

        h.now += 1.5;
        h.tick();
        assert_eq!(h.session.phase(), Phase::Ended);
        assert_eq!(
            h.server.sent().last(),
            Some(&ClientEvent::EndGame)
        );
    }

    #[test]
    fn test_teardown_cancels_timers_and_audio() {
        let mut h = Harness::new(vec![]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.on_audio_event(AudioEventKind::Loaded { duration: None }, ctx));
        h.with(|s, ctx| s.start_countdown(ctx));
        h.with(|s, ctx| s.teardown(ctx));

        assert_eq!(h.scheduler.pending(), 0);
        assert!(h.audio.state().stopped);
        h.now += 10.0;
        h.tick();
        assert_eq!(h.session.phase(), Phase::CountingDown);
        assert!(h.server.sent().is_empty());
    }
}
