//! Render projector: turns a gameplay snapshot into draw commands.
//!
//! Projection is a pure function of the snapshot, the playfield geometry and
//! the tolerance configuration. It never touches the session.

use crate::models::engine::constants::{
    JUDGEMENT_ZONE_HALF_HEIGHT, NOTE_HEIGHT, NOTE_MARGIN, NUM_LANES,
};
use crate::models::engine::{Note, PlayfieldArea};
use crate::models::settings::ToleranceConfig;
use crate::models::stats::{JudgementColors, grade_for};
use crate::shared::snapshot::{AudioStatus, GameplaySnapshot, NotificationLevel};
use crate::state::game::Phase;

pub type Color = [f32; 4];

const BACKGROUND: Color = [0.03, 0.03, 0.07, 1.0];
const PLAYFIELD: Color = [0.08, 0.08, 0.16, 1.0];
const ACCENT: Color = [0.392, 0.71, 0.965, 1.0];
const SEPARATOR: Color = [0.392, 0.71, 0.965, 0.4];
const ZONE: Color = [0.392, 0.71, 0.965, 0.1];
const PRESSED: Color = [0.392, 0.71, 0.965, 0.18];
const FLASH: Color = [1.0, 1.0, 1.0, 0.25];
const SHADOW: Color = [0.0, 0.0, 0.0, 0.3];
const DIM: Color = [0.0, 0.0, 0.0, 0.6];
const TEXT: Color = [1.0, 1.0, 1.0, 1.0];
const ERROR_TEXT: Color = [0.957, 0.263, 0.212, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Left,
    Center,
    Right,
}

/// Text categories, so backends without a font can still surface them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Hud,
    Judgement,
    Overlay,
    Notification,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Color,
    },
    Text {
        x: f32,
        y: f32,
        size: f32,
        anchor: TextAnchor,
        role: TextRole,
        color: Color,
        text: String,
    },
}

/// A projected frame, in window pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub commands: Vec<DrawCommand>,
}

impl Scene {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        self.commands.push(DrawCommand::Rect { x, y, w, h, color });
    }

    fn text(
        &mut self,
        x: f32,
        y: f32,
        size: f32,
        anchor: TextAnchor,
        role: TextRole,
        color: Color,
        text: impl Into<String>,
    ) {
        self.commands.push(DrawCommand::Text {
            x,
            y,
            size,
            anchor,
            role,
            color,
            text: text.into(),
        });
    }

    /// Text of every command with the given role, in draw order.
    pub fn texts(&self, role: TextRole) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { role: r, text, .. } if *r == role => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of note rectangles (shadows excluded).
    pub fn note_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Rect { h, color, .. } if *h == NOTE_HEIGHT && *color != SHADOW))
            .count()
    }
}

/// Screen Y of a note's top edge.
///
/// `judgement_y - (note_time + visual_offset - current_time) * note_speed`:
/// notes move down and cross the judgement line exactly at their time.
pub fn note_y(note: &Note, current_time: f64, area: &PlayfieldArea, config: &ToleranceConfig) -> f32 {
    let time_diff = note.time + config.visual_offset - current_time;
    area.judgement_y - (time_diff * config.note_speed) as f32
}

/// Projects a snapshot onto the playfield.
pub fn project(snapshot: &GameplaySnapshot, area: &PlayfieldArea, config: &ToleranceConfig) -> Scene {
    let mut scene = Scene::new(area.window_width, area.window_height);
    scene.commands.push(DrawCommand::Clear(BACKGROUND));
    scene.rect(area.x, 0.0, area.width, area.height, PLAYFIELD);

    draw_lanes(&mut scene, snapshot, area);
    draw_judgement_line(&mut scene, area);
    draw_notes(&mut scene, snapshot, area, config);
    draw_hud(&mut scene, snapshot, area);
    draw_overlay(&mut scene, snapshot, area);
    draw_notifications(&mut scene, snapshot, area);

    scene
}

fn draw_lanes(scene: &mut Scene, snapshot: &GameplaySnapshot, area: &PlayfieldArea) {
    for lane in 0..NUM_LANES {
        let x = area.lane_x(lane);
        if snapshot.lanes_pressed[lane] {
            scene.rect(x, 0.0, area.lane_width, area.height, PRESSED);
        }
        if snapshot.lanes_flashing[lane] {
            scene.rect(x, 0.0, area.lane_width, area.height, FLASH);
        }
        if lane > 0 {
            scene.rect(x - 1.0, 0.0, 2.0, area.height, SEPARATOR);
        }
    }
}

fn draw_judgement_line(scene: &mut Scene, area: &PlayfieldArea) {
    let y = area.judgement_y;
    scene.rect(
        area.x,
        y - JUDGEMENT_ZONE_HALF_HEIGHT,
        area.width,
        JUDGEMENT_ZONE_HALF_HEIGHT * 2.0,
        ZONE,
    );
    scene.rect(area.x, y - 2.0, area.width, 4.0, ACCENT);
}

fn draw_notes(
    scene: &mut Scene,
    snapshot: &GameplaySnapshot,
    area: &PlayfieldArea,
    config: &ToleranceConfig,
) {
    let colors = JudgementColors::new();
    let note_width = (area.lane_width - NOTE_MARGIN * 2.0).max(1.0);

    for note in &snapshot.notes {
        if note.lane >= NUM_LANES {
            continue;
        }
        let y = note_y(note, snapshot.current_time, area, config);
        if y <= -NOTE_HEIGHT || y >= area.height + NOTE_HEIGHT {
            continue;
        }

        // Tint with the tier the note would earn right now.
        let time_diff = note.time + config.visual_offset - snapshot.current_time;
        let color = colors.for_judgement(config.hit_window.judge(time_diff));

        let x = area.lane_x(note.lane) + NOTE_MARGIN;
        scene.rect(x + 2.0, y + 2.0, note_width, NOTE_HEIGHT, SHADOW);
        scene.rect(x, y, note_width, NOTE_HEIGHT, color);
    }
}

fn draw_hud(scene: &mut Scene, snapshot: &GameplaySnapshot, area: &PlayfieldArea) {
    if snapshot.phase == Phase::Idle {
        return;
    }
    let stats = &snapshot.stats;
    let right = area.window_width as f32 - 20.0;

    scene.text(20.0, 30.0, 18.0, TextAnchor::Left, TextRole::Hud, TEXT, &snapshot.song_title);
    scene.text(
        right,
        30.0,
        24.0,
        TextAnchor::Right,
        TextRole::Hud,
        TEXT,
        format_score(stats.score),
    );
    scene.text(
        right,
        60.0,
        18.0,
        TextAnchor::Right,
        TextRole::Hud,
        TEXT,
        format!("{:.1}%", stats.accuracy),
    );

    if stats.combo > 0 {
        scene.text(
            area.x + area.width / 2.0,
            area.height * 0.35,
            28.0,
            TextAnchor::Center,
            TextRole::Hud,
            ACCENT,
            format!("{} COMBO", stats.combo),
        );
    }

    if let Some(duration) = snapshot.duration
        && duration > 0.0
    {
        let elapsed = snapshot.current_time.max(0.0);
        scene.text(
            20.0,
            60.0,
            16.0,
            TextAnchor::Left,
            TextRole::Hud,
            TEXT,
            format!("{} / {}", format_time(elapsed), format_time(duration)),
        );
        let progress = (elapsed / duration).clamp(0.0, 1.0) as f32;
        scene.rect(0.0, 0.0, area.window_width as f32 * progress, 4.0, ACCENT);
    }

    if let Some(judgement) = snapshot.judgement {
        let colors = JudgementColors::new();
        scene.text(
            area.x + area.width / 2.0,
            area.height * 0.45,
            36.0,
            TextAnchor::Center,
            TextRole::Judgement,
            colors.for_judgement(Some(judgement)),
            judgement.to_string(),
        );
    }
}

fn draw_overlay(scene: &mut Scene, snapshot: &GameplaySnapshot, area: &PlayfieldArea) {
    let cx = area.window_width as f32 / 2.0;
    let cy = area.height / 2.0;

    let lines: Vec<String> = match snapshot.phase {
        Phase::Idle => vec!["No chart loaded".to_string()],
        Phase::WaitingForStart => {
            let mut lines = vec!["Press Enter to start".to_string()];
            if snapshot.audio == AudioStatus::Loading {
                lines.push("Loading audio...".to_string());
            }
            lines
        }
        Phase::CountingDown => {
            let remaining = (-snapshot.current_time).max(0.0).ceil() as u32;
            vec![remaining.max(1).to_string()]
        }
        Phase::Playing if snapshot.awaiting_start => vec!["Waiting for server...".to_string()],
        Phase::Playing => return,
        Phase::Paused => vec!["PAUSED".to_string(), "Esc to resume".to_string()],
        Phase::Ended => match &snapshot.results {
            Some(results) => vec![
                format!("Grade {}", grade_for(results.accuracy)),
                format!("Score {}", format_score(results.score)),
                format!("Accuracy {:.1}%", results.accuracy),
                format!("Max combo {}", results.max_combo),
                format!(
                    "Perfect {} / Great {} / Good {} / Miss {}",
                    results.judgments.perfect,
                    results.judgments.great,
                    results.judgments.good,
                    results.judgments.miss
                ),
                "Enter to play again".to_string(),
            ],
            None => vec!["Waiting for results...".to_string()],
        },
    };

    if snapshot.phase != Phase::CountingDown {
        scene.rect(0.0, 0.0, area.window_width as f32, area.height, DIM);
    }
    let size = if snapshot.phase == Phase::CountingDown { 72.0 } else { 28.0 };
    let top = cy - (lines.len() as f32 - 1.0) * size * 0.6;
    for (i, line) in lines.into_iter().enumerate() {
        scene.text(
            cx,
            top + i as f32 * size * 1.2,
            size,
            TextAnchor::Center,
            TextRole::Overlay,
            TEXT,
            line,
        );
    }
}

fn draw_notifications(scene: &mut Scene, snapshot: &GameplaySnapshot, area: &PlayfieldArea) {
    let cx = area.window_width as f32 / 2.0;
    for (i, notification) in snapshot.notifications.iter().enumerate() {
        let color = match notification.level {
            NotificationLevel::Info => TEXT,
            NotificationLevel::Error => ERROR_TEXT,
        };
        scene.text(
            cx,
            100.0 + i as f32 * 24.0,
            16.0,
            TextAnchor::Center,
            TextRole::Notification,
            color,
            &notification.message,
        );
    }
}

/// `1234567` → `"1,234,567"`.
pub fn format_score(score: u64) -> String {
    let digits = score.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Seconds as `m:ss`.
pub fn format_time(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
