//! Note Set: the notes still waiting for a judgement.

use crate::models::engine::Note;

/// Pending notes in chart order.
///
/// Once sealed (play has started) the set only shrinks, and only through
/// [`NoteSet::remove_matching`] and [`NoteSet::sweep_expired`].
#[derive(Debug, Clone, Default)]
pub struct NoteSet {
    notes: Vec<Note>,
    sealed: bool,
}

impl NoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents. Refused once play has started.
    pub fn load(&mut self, notes: Vec<Note>) -> bool {
        if self.sealed {
            log::warn!(
                "SESSION: Refusing to reload {} notes while playing",
                notes.len()
            );
            return false;
        }

        self.notes = notes;
        true
    }

    /// Locks the contents against reloads.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Removes the first note in `lane` whose time is within `epsilon` of `time`.
    pub fn remove_matching(&mut self, lane: usize, time: f64, epsilon: f64) -> Option<Note> {
        let index = self
            .notes
            .iter()
            .position(|n| n.lane == lane && (n.time - time).abs() < epsilon)?;
        Some(self.notes.remove(index))
    }

    /// Removes and returns every note older than `miss_threshold`.
    pub fn sweep_expired(&mut self, current_time: f64, miss_threshold: f64) -> Vec<Note> {
        let (expired, pending): (Vec<Note>, Vec<Note>) = std::mem::take(&mut self.notes)
            .into_iter()
            .partition(|n| current_time - n.time > miss_threshold);
        self.notes = pending;
        expired
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn lane_notes(&self, lane: usize) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(move |n| n.lane == lane)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(notes: &[(usize, f64)]) -> NoteSet {
        let mut set = NoteSet::new();
        set.load(notes.iter().map(|&(l, t)| Note::new(l, t)).collect());
        set
    }

    #[test]
    fn test_remove_matching_removes_at_most_one() {
        let mut notes = set(&[(0, 1.0), (0, 1.0005), (1, 1.0)]);
        assert_eq!(notes.remove_matching(0, 1.0, 0.001), Some(Note::new(0, 1.0)));
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn test_remove_matching_twice_is_silent_noop() {
        let mut notes = set(&[(2, 3.5)]);
        assert!(notes.remove_matching(2, 3.5004, 0.001).is_some());
        assert!(notes.remove_matching(2, 3.5004, 0.001).is_none());
        assert!(notes.is_empty());
    }

    #[test]
    fn test_remove_matching_respects_lane() {
        let mut notes = set(&[(1, 2.0)]);
        assert!(notes.remove_matching(0, 2.0, 0.001).is_none());
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_sweep_removes_adjacent_expired_notes() {
        // Consecutive expired entries must not be skipped.
        let mut notes = set(&[(0, 1.0), (1, 1.1), (2, 1.2), (3, 5.0)]);
        let removed = notes.sweep_expired(2.0, 0.25);
        assert_eq!(removed.len(), 3);
        assert_eq!(notes.notes(), &[Note::new(3, 5.0)]);
    }

    #[test]
    fn test_second_sweep_is_empty() {
        let mut notes = set(&[(0, 1.0), (0, 1.5)]);
        assert_eq!(notes.sweep_expired(3.0, 0.25).len(), 2);
        assert!(notes.sweep_expired(3.0, 0.25).is_empty());
    }

    #[test]
    fn test_sweep_boundary_is_exclusive() {
        let mut notes = set(&[(0, 1.0)]);
        assert!(notes.sweep_expired(1.25, 0.25).is_empty());
    }

    #[test]
    fn test_load_refused_once_sealed() {
        let mut notes = set(&[(0, 1.0)]);
        notes.seal();
        assert!(!notes.load(vec![]));
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_lane_notes_filters() {
        let notes = set(&[(0, 1.0), (1, 1.5), (0, 2.0)]);
        assert_eq!(notes.lane_notes(0).count(), 2);
        assert_eq!(notes.lane_notes(3).count(), 0);
    }
}
