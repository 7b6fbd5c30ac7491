//! Hit attempts and the auto-miss sweep.
//!
//! Nothing here is authoritative: the nearest note is a hint sent along with
//! the raw timestamp, and the server decides what the press was worth.

use super::notes::NoteSet;
use crate::models::engine::{HitWindow, Note};
use crate::models::stats::Judgement;

/// The note a press most likely targeted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitCandidate {
    pub note: Note,
    /// `time - note.time`; negative when early.
    pub delta: f64,
    /// Local tier preview, `None` outside the `good` window.
    pub preview: Option<Judgement>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitAttempt {
    pub lane: usize,
    pub time: f64,
    pub candidate: Option<HitCandidate>,
}

/// Picks the note in `lane` closest to `time`, whether it is still ahead or
/// already behind the judgement line.
pub fn attempt_hit(notes: &NoteSet, window: &HitWindow, lane: usize, time: f64) -> HitAttempt {
    let candidate = notes
        .lane_notes(lane)
        .min_by(|a, b| (time - a.time).abs().total_cmp(&(time - b.time).abs()))
        .map(|note| {
            let delta = time - note.time;
            HitCandidate {
                note: *note,
                delta,
                preview: window.judge(delta),
            }
        });

    HitAttempt {
        lane,
        time,
        candidate,
    }
}

/// Removes every note past the miss threshold. Each returned note must be
/// reported as an auto-miss exactly once.
pub fn sweep_misses(notes: &mut NoteSet, window: &HitWindow, time: f64) -> Vec<Note> {
    notes.sweep_expired(time, window.miss_threshold())
}
