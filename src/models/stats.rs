//! Judgement tiers and score snapshots.
//!
//! The server owns the authoritative numbers; the client keeps the latest
//! snapshot it was told about, purely for display.

use serde::{Deserialize, Serialize};
use std::fmt;

/// RGBA colors for each judgement tier, also used to tint approaching notes.
#[derive(Clone, Debug)]
pub struct JudgementColors {
    pub perfect: [f32; 4],
    pub great: [f32; 4],
    pub good: [f32; 4],
    pub miss: [f32; 4],
    pub idle: [f32; 4],
}

impl JudgementColors {
    pub fn new() -> Self {
        Self {
            perfect: [1.0, 0.843, 0.0, 1.0],  // Gold
            great: [0.298, 0.686, 0.314, 1.0], // Green
            good: [0.129, 0.588, 0.953, 1.0],  // Blue
            miss: [0.957, 0.263, 0.212, 1.0],  // Red
            idle: [0.392, 0.71, 0.965, 1.0],   // Light blue
        }
    }

    pub fn for_judgement(&self, judgement: Option<Judgement>) -> [f32; 4] {
        match judgement {
            Some(Judgement::Perfect) => self.perfect,
            Some(Judgement::Great) => self.great,
            Some(Judgement::Good) => self.good,
            Some(Judgement::Miss) => self.miss,
            None => self.idle,
        }
    }
}

impl Default for JudgementColors {
    fn default() -> Self {
        Self::new()
    }
}

/// Hit judgement types from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgement {
    Perfect,
    Great,
    Good,
    Miss,
}

impl Judgement {
    pub fn is_hit(self) -> bool {
        !matches!(self, Judgement::Miss)
    }
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Judgement::Perfect => "PERFECT",
            Judgement::Great => "GREAT",
            Judgement::Good => "GOOD",
            Judgement::Miss => "MISS",
        };
        f.write_str(label)
    }
}

/// Per-tier counters as reported by the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgementCounts {
    #[serde(default)]
    pub perfect: u32,
    #[serde(default)]
    pub great: u32,
    #[serde(default)]
    pub good: u32,
    #[serde(default)]
    pub miss: u32,
}

impl JudgementCounts {
    pub fn total(&self) -> u32 {
        self.perfect + self.great + self.good + self.miss
    }

    pub fn record(&mut self, judgement: Judgement) {
        match judgement {
            Judgement::Perfect => self.perfect += 1,
            Judgement::Great => self.great += 1,
            Judgement::Good => self.good += 1,
            Judgement::Miss => self.miss += 1,
        }
    }

    /// Weighted accuracy percentage (0-100) as the judging server computes it.
    ///
    /// - Perfect: 100%
    /// - Great: 80%
    /// - Good: 50%
    /// - Miss: 0%
    pub fn weighted_accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }

        let weighted =
            self.perfect as f64 + self.great as f64 * 0.8 + self.good as f64 * 0.5;
        weighted / total as f64 * 100.0
    }
}

/// Latest known score state, replaced wholesale on every server judgement.
#[derive(Clone, Debug, PartialEq)]
pub struct StatsSnapshot {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub accuracy: f64,
    pub judgments: JudgementCounts,
}

impl StatsSnapshot {
    pub fn new() -> Self {
        Self {
            score: 0,
            combo: 0,
            max_combo: 0,
            accuracy: 100.0,
            judgments: JudgementCounts::default(),
        }
    }
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Final results sent by the server when a game ends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameResults {
    #[serde(default)]
    pub score: u64,
    #[serde(default)]
    pub max_combo: u32,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default)]
    pub judgments: JudgementCounts,
    #[serde(default)]
    pub play_time: f64,
    #[serde(default)]
    pub total_notes: u32,
}

/// Letter grade shown on the results overlay.
pub fn grade_for(accuracy: f64) -> &'static str {
    if accuracy >= 95.0 {
        "S"
    } else if accuracy >= 90.0 {
        "A"
    } else if accuracy >= 80.0 {
        "B"
    } else if accuracy >= 70.0 {
        "C"
    } else {
        "D"
    }
}
