//! Snapshot creation for `PlaySession`.

use super::PlaySession;
use crate::models::engine::constants::{END_GRACE_SECS, NUM_LANES};
use crate::shared::snapshot::GameplaySnapshot;
use crate::state::traits::Snapshot;

impl Snapshot for PlaySession {
    type Output = GameplaySnapshot;

    /// Captures the session as of the last handler call, with flashes and
    /// notifications aged to `now`. The session stops being updated while
    /// paused or ended, so its own last-seen time can be stale.
    ///
    /// Pressed lanes are input state the session never sees; the loop fills
    /// them in.
    fn create_snapshot(&self, now: f64) -> GameplaySnapshot {
        let mut lanes_flashing = [false; NUM_LANES];
        for (flashing, until) in lanes_flashing.iter_mut().zip(self.lane_flash_until) {
            *flashing = until > now;
        }

        let duration = self
            .audio_duration
            .or(self.chart.duration)
            .unwrap_or_else(|| self.chart.last_note_time() + END_GRACE_SECS);

        GameplaySnapshot {
            phase: self.phase,
            awaiting_start: self.awaiting_start_ack,
            current_time: self.current_time,
            notes: self.notes.notes().to_vec(),
            lanes_pressed: [false; NUM_LANES],
            lanes_flashing,
            judgement: self
                .judgement_flash
                .filter(|(_, until)| *until > now)
                .map(|(judgement, _)| judgement),
            stats: self.stats.clone(),
            song_title: self.chart.song_title.clone(),
            duration: Some(duration),
            audio: self.audio,
            notifications: self.notifications.active(now),
            results: self.results.clone(),
        }
    }
}

impl PlaySession {
    /// Earliest moment a visible flash or notification goes away, so a
    /// stopped loop knows when the next frame is due.
    pub fn next_overlay_expiry(&self, now: f64) -> Option<f64> {
        let judgement = self.judgement_flash.map(|(_, until)| until);
        self.lane_flash_until
            .iter()
            .copied()
            .chain(judgement)
            .filter(|t| *t > now)
            .chain(self.notifications.next_expiry(now))
            .min_by(f64::total_cmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::engine::Note;
    use crate::models::stats::Judgement;
    use crate::state::game::Phase;
    use crate::state::game::tests::Harness;

    #[test]
    fn test_snapshot_mirrors_session() {
        let mut h = Harness::new(vec![Note::new(1, 4.0), Note::new(2, 6.0)]);
        h.with(|s, ctx| s.begin(ctx));

        let snapshot = h.session.create_snapshot(h.now);
        assert_eq!(snapshot.phase, Phase::WaitingForStart);
        assert_eq!(snapshot.notes.len(), 2);
        assert_eq!(snapshot.song_title, "Harness");
        assert_eq!(snapshot.duration, Some(6.0 + END_GRACE_SECS));
        assert!(snapshot.judgement.is_none());
    }

    #[test]
    fn test_flashes_expire() {
        let mut h = Harness::new(vec![]);
        h.start_playing();
        h.session.judgement_flash = Some((Judgement::Great, h.now + 0.6));
        h.session.lane_flash_until[1] = h.now + 0.3;

        let snapshot = h.session.create_snapshot(h.now);
        assert_eq!(snapshot.judgement, Some(Judgement::Great));
        assert_eq!(snapshot.lanes_flashing, [false, true, false, false]);

        h.now += 1.0;
        let snapshot = h.session.create_snapshot(h.now);
        assert!(snapshot.judgement.is_none());
        assert_eq!(snapshot.lanes_flashing, [false; NUM_LANES]);
    }

    #[test]
    fn test_audio_duration_wins() {
        let mut h = Harness::new(vec![Note::new(0, 1.0)]);
        h.start_playing();
        assert_eq!(h.session.create_snapshot(h.now).duration, Some(60.0));
    }

    #[test]
    fn test_next_overlay_expiry() {
        let mut h = Harness::new(vec![]);
        h.start_playing();
        assert_eq!(h.session.next_overlay_expiry(h.now), None);

        h.session.judgement_flash = Some((Judgement::Good, h.now + 0.6));
        h.session.lane_flash_until[3] = h.now + 0.3;
        assert_eq!(h.session.next_overlay_expiry(h.now), Some(h.now + 0.3));
        assert_eq!(h.session.next_overlay_expiry(h.now + 0.4), Some(h.now + 0.6));
        assert_eq!(h.session.next_overlay_expiry(h.now + 1.0), None);
    }
}
