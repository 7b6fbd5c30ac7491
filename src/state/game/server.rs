//! Reconciliation with server replies.
//!
//! Replies may arrive late, twice, or for notes the sweep already removed.
//! Every handler here is safe to apply in any of those cases: removal is
//! best-effort and the stats snapshot is replaced, never accumulated.

use super::PlaySession;
use crate::models::engine::Note;
use crate::models::engine::constants::{
    JUDGEMENT_FLASH_SECS, LANE_FLASH_SECS, NOTE_MATCH_EPSILON_SECS, NUM_LANES,
};
use crate::net::protocol::{ChartPayload, NoteJudgment, ServerEvent};
use crate::shared::snapshot::{AudioStatus, NotificationLevel};
use crate::state::game::Phase;
use crate::state::traits::SessionContext;

impl PlaySession {
    pub fn on_server_event(&mut self, event: ServerEvent, ctx: &mut SessionContext) {
        self.now = ctx.now;

        match event {
            ServerEvent::GameStarted { chart_data, .. } => self.on_game_started(chart_data, ctx),
            ServerEvent::NoteJudgment(judgment) => self.on_note_judgment(judgment),
            ServerEvent::GamePaused => {
                if self.take_toggle_ack() {
                    return;
                }
                // Server-initiated pause.
                self.pause(ctx);
            }
            ServerEvent::GameResumed => {
                if self.take_toggle_ack() {
                    return;
                }
                self.resume(ctx);
            }
            ServerEvent::GameEnded { results } => {
                if !matches!(self.phase, Phase::Playing | Phase::Paused | Phase::Ended) {
                    log::debug!("SESSION: game_ended ignored in phase {}", self.phase);
                    return;
                }
                self.finish(ctx);
                log::info!(
                    "SESSION: Results: score {}, accuracy {:.1}%",
                    results.score,
                    results.accuracy
                );
                self.results = Some(results);
            }
            ServerEvent::GameError { error } => {
                // A rejected or lost toggle is never acknowledged.
                if self.unacked_toggles > 0 {
                    log::debug!(
                        "SESSION: Dropping {} pending toggle ack(s)",
                        self.unacked_toggles
                    );
                    self.unacked_toggles = 0;
                }
                self.notify(NotificationLevel::Error, error);
            }
        }
    }

    /// Consumes one outstanding local pause/resume request, if any.
    fn take_toggle_ack(&mut self) -> bool {
        if self.unacked_toggles > 0 {
            self.unacked_toggles -= 1;
            true
        } else {
            false
        }
    }

    fn on_game_started(&mut self, chart_data: Option<ChartPayload>, ctx: &mut SessionContext) {
        if !(self.phase == Phase::Playing && self.awaiting_start_ack) {
            log::debug!("SESSION: game_started ignored in phase {}", self.phase);
            return;
        }

        if self.notes.is_empty()
            && let Some(payload) = chart_data
        {
            let notes: Vec<Note> = payload
                .notes
                .into_iter()
                .filter(|n| n.lane < NUM_LANES && n.time.is_finite())
                .collect();
            if !notes.is_empty() {
                log::info!("SESSION: Loading {} notes from the server copy", notes.len());
                self.notes.load(notes);
            }
        }

        self.notes.seal();
        self.awaiting_start_ack = false;
        self.clock.start_playing(ctx.now);
        self.current_time = 0.0;

        if self.audio == AudioStatus::Ready {
            ctx.audio.seek(0.0);
            ctx.audio.play();
            self.audio_playing = true;
        }
        log::info!(
            "SESSION: #{} started ({} notes, audio {})",
            self.generation,
            self.notes.len(),
            if self.audio_playing { "on" } else { "off" }
        );
    }

    fn on_note_judgment(&mut self, judgment: NoteJudgment) {
        if !matches!(self.phase, Phase::Playing | Phase::Paused | Phase::Ended) {
            log::debug!("SESSION: note_judgment ignored in phase {}", self.phase);
            return;
        }

        if judgment.hit
            && let Some(note_time) = judgment.note_time
        {
            let removed =
                self.notes
                    .remove_matching(judgment.lane, note_time, NOTE_MATCH_EPSILON_SECS);
            if removed.is_none() {
                log::debug!(
                    "SESSION: Confirmed note lane {} at {:.3}s was already gone",
                    judgment.lane,
                    note_time
                );
            }
        }

        self.stats = judgment.stats();
        self.judgement_flash = Some((judgment.judgment, self.now + JUDGEMENT_FLASH_SECS));
        if judgment.hit && judgment.lane < NUM_LANES {
            self.lane_flash_until[judgment.lane] = self.now + LANE_FLASH_SECS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stats::{GameResults, Judgement, JudgementCounts};
    use crate::state::game::tests::Harness;
    use crate::state::traits::HandleAction;
    use crate::input::events::GameAction;

    fn confirmed_hit(lane: usize, note_time: f64, combo: u32) -> ServerEvent {
        ServerEvent::NoteJudgment(NoteJudgment {
            lane,
            judgment: Judgement::Perfect,
            hit: true,
            score: 1000 * combo as u64,
            combo,
            max_combo: combo,
            accuracy: 100.0,
            judgments: JudgementCounts {
                perfect: combo,
                ..JudgementCounts::default()
            },
            note_time: Some(note_time),
        })
    }

    #[test]
    fn test_confirmation_is_idempotent() {
        let mut h = Harness::new(vec![Note::new(0, 1.0), Note::new(0, 2.0)]);
        h.start_playing();

        h.with(|s, ctx| s.on_server_event(confirmed_hit(0, 1.0004, 1), ctx));
        h.with(|s, ctx| s.on_server_event(confirmed_hit(0, 1.0004, 1), ctx));

        assert_eq!(h.session.notes().notes(), &[Note::new(0, 2.0)]);
        assert_eq!(h.session.stats().score, 1000);
        assert_eq!(h.session.stats().judgments.perfect, 1);
    }

    #[test]
    fn test_miss_updates_stats_without_removal() {
        let mut h = Harness::new(vec![Note::new(1, 1.0)]);
        h.start_playing();

        h.with(|s, ctx| {
            s.on_server_event(
                ServerEvent::NoteJudgment(NoteJudgment {
                    lane: 1,
                    judgment: Judgement::Miss,
                    hit: false,
                    score: 0,
                    combo: 0,
                    max_combo: 0,
                    accuracy: 0.0,
                    judgments: JudgementCounts {
                        miss: 1,
                        ..JudgementCounts::default()
                    },
                    note_time: Some(1.0),
                }),
                ctx,
            )
        });

        assert_eq!(h.session.notes().len(), 1);
        assert_eq!(h.session.stats().judgments.miss, 1);
        assert_eq!(h.session.judgement_flash.map(|(j, _)| j), Some(Judgement::Miss));
        assert!(h.session.lane_flash_until.iter().all(|t| *t < h.now));
    }

    #[test]
    fn test_hit_flashes_lane() {
        let mut h = Harness::new(vec![Note::new(2, 1.0)]);
        h.start_playing();
        h.with(|s, ctx| s.on_server_event(confirmed_hit(2, 1.0, 1), ctx));
        assert!(h.session.lane_flash_until[2] > h.now);
        assert_eq!(h.session.judgement_flash.map(|(j, _)| j), Some(Judgement::Perfect));
    }

    #[test]
    fn test_backup_notes_load_when_local_set_is_empty() {
        let mut h = Harness::new(vec![]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.on_audio_event(crate::system::bus::AudioEventKind::Loaded { duration: None }, ctx));
        h.with(|s, ctx| s.handle_action(&GameAction::Confirm, ctx));
        h.now += 5.0;
        h.tick();

        h.with(|s, ctx| {
            s.on_server_event(
                ServerEvent::GameStarted {
                    chart_data: Some(ChartPayload {
                        song_title: "x".to_string(),
                        notes: vec![Note::new(0, 1.0), Note::new(9, 2.0)],
                    }),
                    start_time: None,
                },
                ctx,
            )
        });

        assert_eq!(h.session.notes().notes(), &[Note::new(0, 1.0)]);
        assert!(h.session.notes().is_sealed());
        assert!(!h.session.is_awaiting_start());
        assert!(h.audio.state().playing);
    }

    #[test]
    fn test_duplicate_game_started_is_ignored() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.start_playing();
        h.audio.state().position = 0.5;
        h.tick();
        h.with(|s, ctx| {
            s.on_server_event(
                ServerEvent::GameStarted {
                    chart_data: None,
                    start_time: None,
                },
                ctx,
            )
        });
        assert_eq!(h.session.current_time(), 0.5);
    }

    #[test]
    fn test_pause_ack_does_not_toggle_again() {
        let mut h = Harness::new(vec![]);
        h.start_playing();
        h.with(|s, ctx| s.handle_action(&GameAction::TogglePause, ctx));
        h.with(|s, ctx| s.handle_action(&GameAction::TogglePause, ctx));

        h.with(|s, ctx| s.on_server_event(ServerEvent::GamePaused, ctx));
        h.with(|s, ctx| s.on_server_event(ServerEvent::GameResumed, ctx));
        assert_eq!(h.session.phase(), Phase::Playing);
    }

    #[test]
    fn test_server_initiated_pause() {
        let mut h = Harness::new(vec![]);
        h.start_playing();
        h.with(|s, ctx| s.on_server_event(ServerEvent::GamePaused, ctx));
        assert_eq!(h.session.phase(), Phase::Paused);
        assert!(h.server.sent().is_empty());
    }

    #[test]
    fn test_game_ended_stores_results_without_resending() {
        let mut h = Harness::new(vec![]);
        h.start_playing();
        let results = GameResults {
            score: 4200,
            accuracy: 91.0,
            ..GameResults::default()
        };
        h.with(|s, ctx| {
            s.on_server_event(
                ServerEvent::GameEnded {
                    results: results.clone(),
                },
                ctx,
            )
        });

        assert_eq!(h.session.phase(), Phase::Ended);
        assert_eq!(h.session.results(), Some(&results));
        assert!(h.server.sent().is_empty());
    }

    #[test]
    fn test_game_error_only_notifies() {
        let mut h = Harness::new(vec![]);
        h.start_playing();
        h.with(|s, ctx| {
            s.on_server_event(
                ServerEvent::GameError {
                    error: "session missing".to_string(),
                },
                ctx,
            )
        });
        assert_eq!(h.session.phase(), Phase::Playing);
        assert_eq!(h.session.notifications.active(h.now)[0].message, "session missing");
    }

    #[test]
    fn test_judgment_before_start_is_ignored() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.with(|s, ctx| s.begin(ctx));
        h.with(|s, ctx| s.on_server_event(confirmed_hit(0, 1.0, 1), ctx));
        assert_eq!(h.session.notes().len(), 1);
        assert_eq!(h.session.stats().score, 0);
    }

    #[test]
    fn test_error_clears_pending_toggle_acks() {
        let mut h = Harness::new(vec![]);
        h.start_playing();
        h.with(|s, ctx| s.handle_action(&GameAction::TogglePause, ctx));
        assert_eq!(h.session.phase(), Phase::Paused);

        h.with(|s, ctx| {
            s.on_server_event(
                ServerEvent::GameError {
                    error: "server link is closed".to_string(),
                },
                ctx,
            )
        });
        // The server resuming on its own must not be taken for an ack.
        h.with(|s, ctx| s.on_server_event(ServerEvent::GameResumed, ctx));
        assert_eq!(h.session.phase(), Phase::Playing);
    }
}
