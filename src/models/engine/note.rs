//! Chart and note structures, plus chart file loading.

use crate::models::engine::constants::NUM_LANES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A single note: a lane and a chart-relative time in seconds.
///
/// Notes are immutable once loaded; the play session only ever removes them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub lane: usize,
    pub time: f64,
}

impl Note {
    pub fn new(lane: usize, time: f64) -> Self {
        Self { lane, time }
    }
}

/// Chart metadata and notes as produced by the chart generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub song_title: String,
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    pub audio_file: String,
    pub notes: Vec<Note>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lanes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

fn default_bpm() -> f64 {
    120.0
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("cannot read chart {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed chart {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid chart: {0}")]
    Invalid(String),
}

impl Chart {
    /// Checks the invariants the play session relies on.
    pub fn validate(&self) -> Result<(), ChartError> {
        if self.audio_file.trim().is_empty() {
            return Err(ChartError::Invalid("missing audio_file".to_string()));
        }

        if let Some(lanes) = self.lanes
            && lanes != NUM_LANES
        {
            return Err(ChartError::Invalid(format!(
                "chart declares {lanes} lanes, only {NUM_LANES} are supported"
            )));
        }

        for (i, note) in self.notes.iter().enumerate() {
            if !note.time.is_finite() {
                return Err(ChartError::Invalid(format!("note {i} has a non-finite time")));
            }
            if note.lane >= NUM_LANES {
                return Err(ChartError::Invalid(format!(
                    "note {i} uses lane {}, expected 0..{NUM_LANES}",
                    note.lane
                )));
            }
        }

        Ok(())
    }

    /// Time of the latest note, or 0 for an empty chart.
    pub fn last_note_time(&self) -> f64 {
        self.notes.iter().map(|n| n.time).fold(0.0, f64::max)
    }

    /// Resolves the chart's audio file.
    ///
    /// Absolute paths are used as-is; relative ones are looked up next to the
    /// chart first, then inside `audio_dir`.
    pub fn resolve_audio_path(&self, chart_path: &Path, audio_dir: &Path) -> PathBuf {
        let audio = Path::new(&self.audio_file);
        if audio.is_absolute() {
            return audio.to_path_buf();
        }

        if let Some(parent) = chart_path.parent() {
            let beside = parent.join(audio);
            if beside.exists() {
                return beside;
            }
        }

        audio_dir.join(audio)
    }
}

/// Loads and validates a chart JSON file.
pub fn load_chart(path: &Path) -> Result<Chart, ChartError> {
    let content = fs::read_to_string(path).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let chart: Chart = serde_json::from_str(&content).map_err(|source| ChartError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    chart.validate()?;

    log::info!(
        "CHART: Loaded '{}' ({} notes, {:.0} BPM)",
        chart.song_title,
        chart.notes.len(),
        chart.bpm
    );
    Ok(chart)
}
