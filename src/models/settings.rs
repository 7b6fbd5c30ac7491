//! Persistent user settings (TOML) and the per-session tolerance configuration.

use crate::models::engine::constants::DEFAULT_MAX_PLAYFIELD_WIDTH;
use crate::models::engine::{HitWindow, InvalidHitWindow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error(transparent)]
    InvalidTolerances(#[from] InvalidHitWindow),
}

/// Judgement windows in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgementSettings {
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
}

impl Default for JudgementSettings {
    fn default() -> Self {
        let window = HitWindow::new();
        Self {
            perfect: window.perfect(),
            great: window.great(),
            good: window.good(),
        }
    }
}

impl JudgementSettings {
    pub fn hit_window(&self) -> Result<HitWindow, InvalidHitWindow> {
        HitWindow::from_custom(self.perfect, self.great, self.good)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Scroll speed in pixels per second.
    pub note_speed: f64,
    /// Shifts where notes are drawn, not when they are judged (seconds).
    pub visual_offset: f64,
    pub max_playfield_width: f32,
    pub debug_mode: bool,
    /// TrueType font for in-frame text. Common system fonts are tried when
    /// unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<PathBuf>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            note_speed: 300.0,
            visual_offset: 0.0,
            max_playfield_width: DEFAULT_MAX_PLAYFIELD_WIDTH,
            debug_mode: false,
            font: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output latency reported to the server with `start_game` (seconds).
    pub audio_delay: f64,
    pub volume: f32,
    pub audio_dir: PathBuf,
    /// Seconds to wait for the audio backend before playing without it.
    pub load_timeout: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            audio_delay: 0.15,
            volume: 0.7,
            audio_dir: PathBuf::from("rhythm_game/assets"),
            load_timeout: 10.0,
        }
    }
}

/// Key names use winit's `KeyCode` spelling (`KeyD`, `Enter`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySettings {
    pub lanes: Vec<String>,
    pub start: String,
    pub pause: String,
    pub restart: String,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            lanes: ["KeyD", "KeyF", "KeyJ", "KeyK"]
                .into_iter()
                .map(String::from)
                .collect(),
            start: "Enter".to_string(),
            pause: "Escape".to_string(),
            restart: "KeyR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// In-process judging server.
    Loopback,
    /// Remote judging server over WebSocket.
    Websocket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub mode: ServerMode,
    pub url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            mode: ServerMode::Loopback,
            url: "ws://127.0.0.1:5000/ws".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub judgement: JudgementSettings,
    pub display: DisplaySettings,
    pub audio: AudioSettings,
    pub keys: KeySettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Loads settings, falling back to defaults for anything unusable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log::info!("SETTINGS: {:?} not found, using defaults", path);
            return Self::default();
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("SETTINGS: Cannot read {:?} ({}), using defaults", path, e);
                return Self::default();
            }
        };

        let mut settings = match Self::parse(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("SETTINGS: {}, using defaults", e);
                return Self::default();
            }
        };

        if let Err(e) = settings.judgement.hit_window() {
            log::warn!("SETTINGS: {}, using default judgement windows", e);
            settings.judgement = JudgementSettings::default();
        }

        settings
    }

    /// Strict variant of [`Settings::load`]: any problem is an error.
    pub fn try_load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::parse(&content)?;
        settings.judgement.hit_window()?;
        Ok(settings)
    }

    fn parse(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Freezes the timing-related settings for one play session.
    pub fn tolerance_config(&self) -> ToleranceConfig {
        let hit_window = self.judgement.hit_window().unwrap_or_else(|e| {
            log::warn!("SETTINGS: {}, using default judgement windows", e);
            HitWindow::new()
        });

        ToleranceConfig {
            hit_window,
            note_speed: self.display.note_speed,
            audio_delay: self.audio.audio_delay,
            visual_offset: self.display.visual_offset,
        }
    }
}

/// Timing configuration shared read-only by judgement and projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceConfig {
    pub hit_window: HitWindow,
    /// Pixels per second.
    pub note_speed: f64,
    pub audio_delay: f64,
    pub visual_offset: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Settings::default().tolerance_config()
    }
}
