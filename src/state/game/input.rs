//! Keyboard actions for a play session.

use super::{PlaySession, judge};
use crate::input::events::GameAction;
use crate::models::engine::constants::NUM_LANES;
use crate::net::protocol::ClientEvent;
use crate::state::game::Phase;
use crate::state::traits::{HandleAction, SessionContext, Transition};

impl HandleAction for PlaySession {
    fn handle_action(&mut self, action: &GameAction, ctx: &mut SessionContext) -> Transition {
        self.now = ctx.now;

        match *action {
            GameAction::Hit { lane } => {
                self.process_hit(lane, ctx);
                Transition::None
            }
            GameAction::Release { .. } => Transition::None,
            GameAction::Confirm => match self.phase {
                Phase::WaitingForStart => {
                    self.start_countdown(ctx);
                    Transition::None
                }
                Phase::Ended => Transition::Restart,
                _ => Transition::None,
            },
            GameAction::TogglePause => {
                let requested = match self.phase {
                    Phase::Playing => self.pause(ctx).then_some(ClientEvent::PauseGame),
                    Phase::Paused => self.resume(ctx).then_some(ClientEvent::ResumeGame),
                    _ => None,
                };
                if let Some(event) = requested {
                    self.unacked_toggles += 1;
                    ctx.emit(event);
                }
                Transition::None
            }
            GameAction::Restart => Transition::Restart,
            GameAction::Quit => Transition::Quit,
        }
    }
}

impl PlaySession {
    /// Reports a press to the server with the nearest note as a hint.
    ///
    /// Nothing is removed locally; the note goes away when the server
    /// confirms the hit, or through the auto-miss sweep.
    fn process_hit(&mut self, lane: usize, ctx: &mut SessionContext) {
        if lane >= NUM_LANES {
            return;
        }
        if !self.is_live() {
            log::debug!("LOGIC: Press on lane {} ignored in phase {}", lane, self.phase);
            return;
        }

        let time = self.sample_time(ctx);
        self.report_misses(ctx);

        let attempt =
            judge::attempt_hit(&self.notes, &self.options.tolerance.hit_window, lane, time);

        match attempt.candidate {
            Some(candidate) => log::debug!(
                "LOGIC: Lane {} at {:.3}s -> note {:.3}s ({:+.3}s, preview {:?})",
                lane,
                time,
                candidate.note.time,
                candidate.delta,
                candidate.preview
            ),
            None => log::debug!("LOGIC: Lane {} at {:.3}s -> no note", lane, time),
        }

        ctx.emit(ClientEvent::HitNote {
            lane,
            time,
            note_time: attempt.candidate.map(|c| c.note.time),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::engine::Note;
    use crate::state::game::tests::Harness;

    fn hits(h: &Harness) -> Vec<ClientEvent> {
        h.server
            .sent()
            .into_iter()
            .filter(|e| matches!(e, ClientEvent::HitNote { .. }))
            .collect()
    }

    #[test]
    fn test_hit_reports_nearest_note() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.start_playing();
        h.audio.state().position = 1.03;
        h.with(|s, ctx| s.handle_action(&GameAction::Hit { lane: 0 }, ctx));

        assert_eq!(
            hits(&h),
            vec![ClientEvent::HitNote {
                lane: 0,
                time: 1.03,
                note_time: Some(1.0)
            }]
        );
        // Still pending until the server confirms.
        assert_eq!(h.session.notes().len(), 1);
    }

    #[test]
    fn test_late_hit_sweeps_first() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.start_playing();
        h.audio.state().position = 1.3;
        h.with(|s, ctx| s.handle_action(&GameAction::Hit { lane: 0 }, ctx));

        let sent = h.server.sent();
        assert_eq!(
            sent,
            vec![
                ClientEvent::AutoMiss {
                    lane: 0,
                    note_time: 1.0
                },
                ClientEvent::HitNote {
                    lane: 0,
                    time: 1.3,
                    note_time: None
                },
            ]
        );
    }

    #[test]
    fn test_hit_on_empty_lane_still_reported() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.start_playing();
        h.audio.state().position = 1.0;
        h.with(|s, ctx| s.handle_action(&GameAction::Hit { lane: 3 }, ctx));
        assert_eq!(
            hits(&h),
            vec![ClientEvent::HitNote {
                lane: 3,
                time: 1.0,
                note_time: None
            }]
        );
    }

    #[test]
    fn test_hits_ignored_before_start_ack() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.handle_action(&GameAction::Hit { lane: 0 }, ctx));
        assert!(h.server.sent().is_empty());
    }

    #[test]
    fn test_pause_freezes_clock_and_audio() {
        let mut h = Harness::new(vec![Note::new(0, 10.0)]);
        h.start_playing();
        h.audio.state().position = 2.0;
        h.tick();

        h.with(|s, ctx| s.handle_action(&GameAction::TogglePause, ctx));
        assert_eq!(h.session.phase(), Phase::Paused);
        assert!(!h.audio.state().playing);
        assert_eq!(h.server.sent(), vec![ClientEvent::PauseGame]);

        h.now += 3.0;
        h.tick();
        let a = h.session.current_time();
        h.now += 3.0;
        h.tick();
        assert_eq!(a, h.session.current_time());
        assert_eq!(a, 2.0);
    }

    #[test]
    fn test_resume_restarts_audio() {
        let mut h = Harness::new(vec![Note::new(0, 10.0)]);
        h.start_playing();
        h.with(|s, ctx| s.handle_action(&GameAction::TogglePause, ctx));
        h.with(|s, ctx| s.handle_action(&GameAction::TogglePause, ctx));

        assert_eq!(h.session.phase(), Phase::Playing);
        assert!(h.audio.state().playing);
        assert_eq!(
            h.server.sent(),
            vec![ClientEvent::PauseGame, ClientEvent::ResumeGame]
        );
    }

    #[test]
    fn test_pause_ignored_during_countdown() {
        let mut h = Harness::new(vec![]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.on_audio_event(crate::system::bus::AudioEventKind::Loaded { duration: None }, ctx));
        h.with(|s, ctx| s.handle_action(&GameAction::Confirm, ctx));
        h.with(|s, ctx| s.handle_action(&GameAction::TogglePause, ctx));
        assert_eq!(h.session.phase(), Phase::CountingDown);
        assert!(h.server.sent().is_empty());
    }

    #[test]
    fn test_restart_and_quit_are_transitions() {
        let mut h = Harness::new(vec![]);
        assert_eq!(
            h.with(|s, ctx| s.handle_action(&GameAction::Restart, ctx)),
            Transition::Restart
        );
        assert_eq!(
            h.with(|s, ctx| s.handle_action(&GameAction::Quit, ctx)),
            Transition::Quit
        );
    }
}
