//! Wire events exchanged with the judging server.
//!
//! Every message is a JSON envelope `{"event": "<name>", "data": {...}}`;
//! events without a payload omit `data`.

use crate::models::engine::Note;
use crate::models::settings::ToleranceConfig;
use crate::models::stats::{GameResults, Judgement, JudgementCounts, StatsSnapshot};
use serde::{Deserialize, Serialize};

/// Tolerances forwarded to the server when a game starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartConfig {
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
    pub note_speed: f64,
    pub audio_delay: f64,
    pub visual_offset: f64,
}

impl From<&ToleranceConfig> for StartConfig {
    fn from(config: &ToleranceConfig) -> Self {
        Self {
            perfect: config.hit_window.perfect(),
            great: config.hit_window.great(),
            good: config.hit_window.good(),
            note_speed: config.note_speed,
            audio_delay: config.audio_delay,
            visual_offset: config.visual_offset,
        }
    }
}

/// Client → server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    StartGame {
        chart_path: String,
        config: StartConfig,
    },
    HitNote {
        lane: usize,
        time: f64,
        /// Nearest local note, if any; a hint only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note_time: Option<f64>,
    },
    AutoMiss {
        lane: usize,
        note_time: f64,
    },
    PauseGame,
    ResumeGame,
    EndGame,
}

/// The part of the server's chart copy the client cares about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    #[serde(default)]
    pub song_title: String,
    #[serde(default)]
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteJudgment {
    pub lane: usize,
    pub judgment: Judgement,
    pub hit: bool,
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub accuracy: f64,
    #[serde(default)]
    pub judgments: JudgementCounts,
    #[serde(default)]
    pub note_time: Option<f64>,
}

impl NoteJudgment {
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            score: self.score,
            combo: self.combo,
            max_combo: self.max_combo,
            accuracy: self.accuracy,
            judgments: self.judgments,
        }
    }
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    GameStarted {
        #[serde(default)]
        chart_data: Option<ChartPayload>,
        #[serde(default)]
        start_time: Option<f64>,
    },
    NoteJudgment(NoteJudgment),
    GamePaused,
    GameResumed,
    GameEnded {
        results: GameResults,
    },
    GameError {
        error: String,
    },
}

pub fn encode(event: &ClientEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

pub fn decode(text: &str) -> serde_json::Result<ServerEvent> {
    serde_json::from_str(text)
}
