//! Deferred timers tagged with the session generation that armed them.
//!
//! Timers are polled by the presentation loop before each tick. A fired timer
//! whose generation no longer matches the live session is dropped by the
//! caller, so cancellation is never the only line of defence.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// The pre-play countdown has run out.
    CountdownElapsed,
    /// The audio backend took too long to report the track as loaded.
    AudioLoadTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredTimer {
    pub id: TimerId,
    pub generation: u64,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    id: TimerId,
    generation: u64,
    fire_at: f64,
    kind: TimerKind,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    timers: Vec<Timer>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, generation: u64, fire_at: f64, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            generation,
            fire_at,
            kind,
        });
        id
    }

    /// Returns `false` if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Drops every timer armed by `generation`, returning how many there were.
    pub fn cancel_generation(&mut self, generation: u64) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| t.generation != generation);
        before - self.timers.len()
    }

    /// Removes and returns the timers due at `now`, earliest first.
    pub fn due(&mut self, now: f64) -> Vec<FiredTimer> {
        let (mut due, pending): (Vec<Timer>, Vec<Timer>) = std::mem::take(&mut self.timers)
            .into_iter()
            .partition(|t| t.fire_at <= now);
        self.timers = pending;

        due.sort_by(|a, b| a.fire_at.total_cmp(&b.fire_at));
        due.into_iter()
            .map(|t| FiredTimer {
                id: t.id,
                generation: t.generation,
                kind: t.kind,
            })
            .collect()
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}
