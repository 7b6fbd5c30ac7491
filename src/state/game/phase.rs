//! Lifecycle phases of a play session.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    WaitingForStart,
    CountingDown,
    Playing,
    Paused,
    Ended,
}

impl Phase {
    /// Whether the presentation loop should keep producing frames.
    pub fn drives_frames(self) -> bool {
        matches!(
            self,
            Phase::WaitingForStart | Phase::CountingDown | Phase::Playing
        )
    }

    /// Allowed transitions. Teardown back to `Idle` is handled by discarding
    /// the session, not by a transition.
    pub fn can_transition(self, to: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, to),
            (Idle, WaitingForStart)
                | (WaitingForStart, CountingDown)
                | (CountingDown, Playing)
                | (Playing, Paused)
                | (Paused, Playing)
                | (Playing, Ended)
                | (Paused, Ended)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::WaitingForStart => "waiting for start",
            Phase::CountingDown => "counting down",
            Phase::Playing => "playing",
            Phase::Paused => "paused",
            Phase::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path_is_allowed() {
        let path = [
            Phase::Idle,
            Phase::WaitingForStart,
            Phase::CountingDown,
            Phase::Playing,
            Phase::Paused,
            Phase::Playing,
            Phase::Ended,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_shortcuts_are_rejected() {
        assert!(!Phase::WaitingForStart.can_transition(Phase::Playing));
        assert!(!Phase::CountingDown.can_transition(Phase::Paused));
        assert!(!Phase::Ended.can_transition(Phase::Playing));
        assert!(!Phase::Idle.can_transition(Phase::CountingDown));
    }

    #[test]
    fn test_only_live_phases_drive_frames() {
        assert!(Phase::CountingDown.drives_frames());
        assert!(!Phase::Paused.drives_frames());
        assert!(!Phase::Ended.drives_frames());
        assert!(!Phase::Idle.drives_frames());
    }
}
