//! In-process judging server for offline play.
//!
//! Speaks the same events as the remote server and pushes its replies onto
//! the session event queue, so the client cannot tell the two apart.

use super::protocol::{ChartPayload, ClientEvent, NoteJudgment, ServerEvent, StartConfig};
use super::{NetError, ServerLink};
use crate::models::engine::constants::NOTE_MATCH_EPSILON_SECS;
use crate::models::engine::{HitWindow, Note, load_chart};
use crate::models::stats::{GameResults, Judgement, JudgementCounts};
use crate::system::bus::SessionEvent;
use crossbeam_channel::Sender;
use std::path::Path;
use std::time::Instant;

const COMBO_BONUS_THRESHOLD: u32 = 10;
const MAX_COMBO_BONUS: f64 = 2.0;

/// Points for one judgement at the combo reached after it.
pub fn note_score(judgement: Judgement, combo: u32) -> u64 {
    let base = match judgement {
        Judgement::Perfect => 1000,
        Judgement::Great => 700,
        Judgement::Good => 300,
        Judgement::Miss => 0,
    };

    if combo >= COMBO_BONUS_THRESHOLD {
        let multiplier =
            (1.0 + (combo - COMBO_BONUS_THRESHOLD) as f64 * 0.1).min(MAX_COMBO_BONUS);
        (base as f64 * multiplier) as u64
    } else {
        base
    }
}

/// Server-side grade, one tier finer than the one the client shows.
pub fn server_grade(accuracy: f64) -> &'static str {
    if accuracy >= 95.0 {
        "SS"
    } else if accuracy >= 90.0 {
        "S"
    } else if accuracy >= 80.0 {
        "A"
    } else if accuracy >= 70.0 {
        "B"
    } else if accuracy >= 60.0 {
        "C"
    } else {
        "D"
    }
}

#[derive(Debug, Clone, Copy)]
struct ServerNote {
    note: Note,
    judged: bool,
}

#[derive(Debug, Default)]
struct ServerStats {
    score: u64,
    combo: u32,
    max_combo: u32,
    judgments: JudgementCounts,
}

impl ServerStats {
    fn add_judgement(&mut self, judgement: Judgement) {
        self.judgments.record(judgement);
        if judgement.is_hit() {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
            self.score += note_score(judgement, self.combo);
        } else {
            self.combo = 0;
        }
    }

    fn judgment_reply(&self, lane: usize, judgment: Judgement, note_time: Option<f64>) -> NoteJudgment {
        NoteJudgment {
            lane,
            judgment,
            hit: judgment.is_hit(),
            score: self.score,
            combo: self.combo,
            max_combo: self.max_combo,
            accuracy: self.judgments.weighted_accuracy(),
            judgments: self.judgments,
            note_time,
        }
    }
}

struct LoopbackGame {
    notes: Vec<ServerNote>,
    window: HitWindow,
    stats: ServerStats,
    started_at: Instant,
    paused: bool,
}

impl LoopbackGame {
    fn new(notes: &[Note], config: &StartConfig) -> Self {
        let window = HitWindow::from_custom(config.perfect, config.great, config.good)
            .unwrap_or_else(|e| {
                log::warn!("NET: Loopback using default windows ({})", e);
                HitWindow::new()
            });

        Self {
            notes: notes
                .iter()
                .map(|&note| ServerNote {
                    note,
                    judged: false,
                })
                .collect(),
            window,
            stats: ServerStats::default(),
            started_at: Instant::now(),
            paused: false,
        }
    }

    /// Judges against the nearest unjudged note in `lane` that lies inside
    /// the `good` window; anything else is a miss.
    fn hit(&mut self, lane: usize, time: f64, note_time: Option<f64>) -> NoteJudgment {
        let best = self
            .notes
            .iter_mut()
            .filter(|n| !n.judged && n.note.lane == lane)
            .filter_map(|n| {
                let diff = (time - n.note.time).abs();
                self.window.judge(diff).map(|judgement| (n, diff, judgement))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match best {
            Some((note, _, judgement)) => {
                note.judged = true;
                let matched_time = note.note.time;
                self.stats.add_judgement(judgement);
                self.stats
                    .judgment_reply(lane, judgement, Some(matched_time))
            }
            None => {
                self.stats.add_judgement(Judgement::Miss);
                self.stats
                    .judgment_reply(lane, Judgement::Miss, note_time.or(Some(time)))
            }
        }
    }

    fn auto_miss(&mut self, lane: usize, note_time: f64) -> NoteJudgment {
        if let Some(note) = self.notes.iter_mut().find(|n| {
            !n.judged
                && n.note.lane == lane
                && (n.note.time - note_time).abs() < NOTE_MATCH_EPSILON_SECS
        }) {
            note.judged = true;
        }

        self.stats.add_judgement(Judgement::Miss);
        self.stats
            .judgment_reply(lane, Judgement::Miss, Some(note_time))
    }

    fn results(&self) -> GameResults {
        let accuracy = self.stats.judgments.weighted_accuracy();
        GameResults {
            score: self.stats.score,
            max_combo: self.stats.max_combo,
            accuracy,
            grade: Some(server_grade(accuracy).to_string()),
            judgments: self.stats.judgments,
            play_time: self.started_at.elapsed().as_secs_f64(),
            total_notes: self.stats.judgments.total(),
        }
    }
}

pub struct LoopbackServer {
    events_tx: Sender<SessionEvent>,
    game: Option<LoopbackGame>,
}

impl LoopbackServer {
    pub fn new(events_tx: Sender<SessionEvent>) -> Self {
        Self {
            events_tx,
            game: None,
        }
    }

    fn reply(&self, event: ServerEvent) -> Result<(), NetError> {
        self.events_tx
            .send(SessionEvent::Server(event))
            .map_err(|_| NetError::ChannelClosed)
    }

    fn error(&self, error: &str) -> Result<(), NetError> {
        self.reply(ServerEvent::GameError {
            error: error.to_string(),
        })
    }

    fn start_game(&mut self, chart_path: &str, config: &StartConfig) -> Result<(), NetError> {
        if chart_path.is_empty() {
            return self.error("missing chart path");
        }

        match load_chart(Path::new(chart_path)) {
            Ok(chart) => {
                log::info!("NET: Loopback game started with {} notes", chart.notes.len());
                self.game = Some(LoopbackGame::new(&chart.notes, config));
                self.reply(ServerEvent::GameStarted {
                    chart_data: Some(ChartPayload {
                        song_title: chart.song_title,
                        notes: chart.notes,
                    }),
                    start_time: None,
                })
            }
            Err(e) => {
                log::error!("NET: Loopback failed to load chart: {}", e);
                self.game = None;
                self.error("failed to load chart")
            }
        }
    }
}

impl ServerLink for LoopbackServer {
    fn send(&mut self, event: ClientEvent) -> Result<(), NetError> {
        match event {
            ClientEvent::StartGame { chart_path, config } => self.start_game(&chart_path, &config),
            ClientEvent::HitNote {
                lane,
                time,
                note_time,
            } => match self.game.as_mut() {
                Some(game) if game.paused => self.error("game is paused"),
                Some(game) => {
                    let reply = game.hit(lane, time, note_time);
                    self.reply(ServerEvent::NoteJudgment(reply))
                }
                None => self.error("no game session"),
            },
            ClientEvent::AutoMiss { lane, note_time } => match self.game.as_mut() {
                Some(game) => {
                    let reply = game.auto_miss(lane, note_time);
                    self.reply(ServerEvent::NoteJudgment(reply))
                }
                None => self.error("no game session"),
            },
            ClientEvent::PauseGame => match self.game.as_mut() {
                Some(game) => {
                    game.paused = true;
                    self.reply(ServerEvent::GamePaused)
                }
                None => Ok(()),
            },
            ClientEvent::ResumeGame => match self.game.as_mut() {
                Some(game) => {
                    game.paused = false;
                    self.reply(ServerEvent::GameResumed)
                }
                None => Ok(()),
            },
            ClientEvent::EndGame => match self.game.take() {
                Some(game) => self.reply(ServerEvent::GameEnded {
                    results: game.results(),
                }),
                None => Ok(()),
            },
        }
    }
}
