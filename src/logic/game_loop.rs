//! Presentation loop: one cooperative iteration per display refresh.
//!
//! Each iteration drains the session event queue (input, server replies,
//! audio notifications, chart loads), fires due timers, then advances the
//! live session. Everything runs on the calling thread, so handlers never
//! observe a half-applied update.

use crate::input::events::GameAction;
use crate::logic::audio::AudioBackend;
use crate::logic::scheduler::Scheduler;
use crate::models::engine::Chart;
use crate::models::engine::constants::NUM_LANES;
use crate::models::settings::ToleranceConfig;
use crate::net::ServerLink;
use crate::net::protocol::ServerEvent;
use crate::shared::snapshot::{GameplaySnapshot, NotificationLevel, Notifications};
use crate::state::game::{SessionOptions, TimeSource};
use crate::state::{HandleAction, PlaySession, SessionContext, Snapshot, Transition, Update};
use crate::system::bus::SessionEvent;
use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::Arc;

/// Result of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// The session wants another frame.
    Running,
    /// Nothing is animating; wait for the next event.
    Stopped,
    /// The user asked to close the application.
    Quit,
}

pub struct PresentationLoop {
    events_rx: Receiver<SessionEvent>,
    scheduler: Scheduler,
    audio: Box<dyn AudioBackend>,
    server: Box<dyn ServerLink>,
    time: Box<dyn TimeSource>,
    options: SessionOptions,

    session: Option<PlaySession>,
    next_generation: u64,
    /// Last successfully loaded chart, kept for restarts.
    chart: Option<(Arc<Chart>, PathBuf)>,

    /// Guard against a second loop being started while one is running.
    active: bool,
    dirty: bool,
    quit: bool,
    /// When the next overlay on the last drawn frame expires.
    redraw_at: Option<f64>,

    lanes_pressed: [bool; NUM_LANES],
    notifications: Notifications,
}

impl PresentationLoop {
    pub fn new(
        events_rx: Receiver<SessionEvent>,
        audio: Box<dyn AudioBackend>,
        server: Box<dyn ServerLink>,
        time: Box<dyn TimeSource>,
        options: SessionOptions,
    ) -> Self {
        Self {
            events_rx,
            scheduler: Scheduler::new(),
            audio,
            server,
            time,
            options,
            session: None,
            next_generation: 1,
            chart: None,
            active: false,
            dirty: true,
            quit: false,
            redraw_at: None,
            lanes_pressed: [false; NUM_LANES],
            notifications: Notifications::default(),
        }
    }

    /// Starts driving frames. Returns `false` (and does nothing) if the loop
    /// is already running.
    pub fn start(&mut self) -> bool {
        if self.active {
            log::debug!("LOGIC: Loop already running");
            return false;
        }
        self.active = true;
        log::debug!("LOGIC: Loop started");
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tolerance(&self) -> &ToleranceConfig {
        &self.options.tolerance
    }

    pub fn session(&self) -> Option<&PlaySession> {
        self.session.as_ref()
    }

    /// One iteration: drain events, fire timers, then update the session if
    /// the loop is running.
    pub fn step(&mut self) -> LoopStatus {
        let now = self.time.now();

        let drained = self.drain_events(now);
        let fired = self.fire_timers(now);
        if self.quit {
            return LoopStatus::Quit;
        }
        if drained + fired > 0 {
            self.dirty = true;
            if self.session_drives_frames() {
                self.start();
            }
        }

        if !self.active {
            return LoopStatus::Stopped;
        }

        let transition = match self.session.as_mut() {
            Some(session) => {
                let mut ctx = SessionContext {
                    audio: &mut *self.audio,
                    server: &mut *self.server,
                    scheduler: &mut self.scheduler,
                    now,
                };
                session.update(&mut ctx)
            }
            None => Transition::None,
        };
        self.apply_transition(transition, now);
        self.dirty = true;

        if !self.session_drives_frames() {
            self.active = false;
            log::debug!("LOGIC: Loop stopped");
        }

        if self.quit {
            LoopStatus::Quit
        } else if self.active {
            LoopStatus::Running
        } else {
            LoopStatus::Stopped
        }
    }

    /// Whether the last snapshot is out of date, including a flash or
    /// notification that has expired since it was taken.
    pub fn needs_redraw(&self) -> bool {
        self.active
            || self.dirty
            || self.redraw_at.is_some_and(|t| self.time.now() >= t)
    }

    /// Captures the current state for the projector.
    pub fn snapshot(&mut self) -> GameplaySnapshot {
        self.dirty = false;
        let now = self.time.now();
        self.notifications.prune(now);

        let (mut snapshot, session_expiry) = match &self.session {
            Some(session) => (
                session.create_snapshot(now),
                session.next_overlay_expiry(now),
            ),
            None => (GameplaySnapshot::idle(), None),
        };
        self.redraw_at = session_expiry
            .into_iter()
            .chain(self.notifications.next_expiry(now))
            .min_by(f64::total_cmp);

        snapshot.lanes_pressed = self.lanes_pressed;
        snapshot.notifications.extend(self.notifications.active(now));
        snapshot
    }

    fn session_drives_frames(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.phase().drives_frames())
    }

    fn drain_events(&mut self, now: f64) -> usize {
        let mut count = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            count += 1;
            self.handle_event(event, now);
            if self.quit {
                break;
            }
        }
        count
    }

    fn handle_event(&mut self, event: SessionEvent, now: f64) {
        match event {
            SessionEvent::Input(action) => self.handle_input(action, now),
            SessionEvent::ChartLoaded { path, result } => match result {
                Ok(chart) => {
                    self.chart = Some((Arc::new(chart), path));
                    self.rebuild_session(now);
                }
                Err(e) => {
                    self.notifications.push(
                        now,
                        NotificationLevel::Error,
                        format!("Failed to load chart: {e}"),
                    );
                }
            },
            SessionEvent::Audio(event) => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                if session.generation() != event.generation {
                    log::debug!(
                        "AUDIO: Discarding event for session #{} (live: #{})",
                        event.generation,
                        session.generation()
                    );
                    return;
                }
                let mut ctx = SessionContext {
                    audio: &mut *self.audio,
                    server: &mut *self.server,
                    scheduler: &mut self.scheduler,
                    now,
                };
                session.on_audio_event(event.kind, &mut ctx);
            }
            SessionEvent::Server(event) => {
                let Some(session) = self.session.as_mut() else {
                    match event {
                        // Typically a failed connect racing the chart load.
                        ServerEvent::GameError { error } => {
                            self.notifications
                                .push(now, NotificationLevel::Error, error);
                        }
                        other => log::debug!("NET: {:?} ignored, no session", other),
                    }
                    return;
                };
                let mut ctx = SessionContext {
                    audio: &mut *self.audio,
                    server: &mut *self.server,
                    scheduler: &mut self.scheduler,
                    now,
                };
                session.on_server_event(event, &mut ctx);
            }
        }
    }

    fn handle_input(&mut self, action: GameAction, now: f64) {
        match action {
            GameAction::Hit { lane } if lane < NUM_LANES => self.lanes_pressed[lane] = true,
            GameAction::Release { lane } if lane < NUM_LANES => self.lanes_pressed[lane] = false,
            _ => {}
        }

        let transition = match self.session.as_mut() {
            Some(session) => {
                let mut ctx = SessionContext {
                    audio: &mut *self.audio,
                    server: &mut *self.server,
                    scheduler: &mut self.scheduler,
                    now,
                };
                session.handle_action(&action, &mut ctx)
            }
            None => match action {
                GameAction::Quit => Transition::Quit,
                GameAction::Restart => Transition::Restart,
                _ => Transition::None,
            },
        };
        self.apply_transition(transition, now);
    }

    fn fire_timers(&mut self, now: f64) -> usize {
        let fired = self.scheduler.due(now);
        let count = fired.len();

        for timer in fired {
            let Some(session) = self.session.as_mut() else {
                log::debug!("LOGIC: Discarding {:?}, no session", timer.kind);
                continue;
            };
            if session.generation() != timer.generation {
                log::debug!(
                    "LOGIC: Discarding stale {:?} from session #{} (live: #{})",
                    timer.kind,
                    timer.generation,
                    session.generation()
                );
                continue;
            }
            let mut ctx = SessionContext {
                audio: &mut *self.audio,
                server: &mut *self.server,
                scheduler: &mut self.scheduler,
                now,
            };
            session.on_timer(timer.kind, &mut ctx);
        }
        count
    }

    fn apply_transition(&mut self, transition: Transition, now: f64) {
        match transition {
            Transition::None => {}
            Transition::Restart => {
                if self.chart.is_some() {
                    log::info!("LOGIC: Restarting");
                    self.rebuild_session(now);
                }
            }
            Transition::Quit => {
                log::info!("LOGIC: Quit received...");
                self.teardown_session(now);
                self.active = false;
                self.quit = true;
            }
        }
    }

    fn teardown_session(&mut self, now: f64) {
        if let Some(mut session) = self.session.take() {
            let mut ctx = SessionContext {
                audio: &mut *self.audio,
                server: &mut *self.server,
                scheduler: &mut self.scheduler,
                now,
            };
            session.teardown(&mut ctx);
        }
    }

    /// Replaces the live session with a fresh one for the stored chart.
    fn rebuild_session(&mut self, now: f64) {
        let Some((chart, path)) = self.chart.clone() else {
            return;
        };
        self.teardown_session(now);

        let generation = self.next_generation;
        self.next_generation += 1;

        let mut session = PlaySession::new(generation, chart, path, self.options.clone());
        let mut ctx = SessionContext {
            audio: &mut *self.audio,
            server: &mut *self.server,
            scheduler: &mut self.scheduler,
            now,
        };
        session.begin(&mut ctx);
        self.session = Some(session);
        self.dirty = true;
        self.start();
    }
}
