//! Virtual-clock timer queue.
//!
//! [`TimerQueue`] implements [`sequencer::Scheduler`] without touching a real
//! clock. Drivers move time forward explicitly and pop elapsed timers in due
//! order; timers due at the same instant fire in the order they were
//! scheduled.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use sequencer::{Scheduler, TimerHandle, TimerKind};

/// A timer that has elapsed and must be delivered to the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    /// Handle returned when the timer was scheduled.
    pub handle: TimerHandle,
    /// Which timer it was.
    pub kind: TimerKind,
    /// Time the timer was due.
    pub due: Duration,
}

/// Deterministic scheduler driven by an explicit clock.
#[derive(Debug, Default, Clone)]
pub struct TimerQueue {
    now: Duration,
    next_id: u64,
    // (due, handle) keeps same-instant timers in scheduling order.
    pending: BTreeMap<(Duration, u64), TimerKind>,
    due_of: HashMap<u64, Duration>,
}

impl TimerQueue {
    /// Creates an empty queue with its clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward to `now`. Moving backwards is ignored.
    pub fn advance_to(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(due, _)| *due)
    }

    /// Removes and returns the earliest timer due at or before `deadline`,
    /// moving the clock to its due time.
    pub fn pop_due(&mut self, deadline: Duration) -> Option<FiredTimer> {
        let (&(due, id), _) = self.pending.iter().next()?;
        if due > deadline {
            return None;
        }
        let kind = self.pending.remove(&(due, id))?;
        self.due_of.remove(&id);
        self.advance_to(due);
        Some(FiredTimer {
            handle: TimerHandle::new(id),
            kind,
            due,
        })
    }

    /// Pending timers in due order.
    pub fn pending(&self) -> impl Iterator<Item = (Duration, TimerKind)> + '_ {
        self.pending.iter().map(|((due, _), kind)| (*due, *kind))
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Scheduler for TimerQueue {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle {
        self.next_id += 1;
        let due = self.now.saturating_add(delay);
        self.pending.insert((due, self.next_id), kind);
        self.due_of.insert(self.next_id, due);
        TimerHandle::new(self.next_id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let id = handle.as_u64();
        if let Some(due) = self.due_of.remove(&id) {
            self.pending.remove(&(due, id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn pops_in_due_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule(ms(300), TimerKind::OverlayRemoval);
        q.schedule(ms(100), TimerKind::ContentReveal);
        q.schedule(ms(100), TimerKind::Emphasis);

        let order: Vec<_> = std::iter::from_fn(|| q.pop_due(ms(1_000)))
            .map(|f| (f.kind, f.due))
            .collect();

        assert_eq!(
            order,
            vec![
                (TimerKind::ContentReveal, ms(100)),
                (TimerKind::Emphasis, ms(100)),
                (TimerKind::OverlayRemoval, ms(300)),
            ]
        );
        assert_eq!(q.now(), ms(300));
    }

    #[test]
    fn pop_respects_deadline() {
        let mut q = TimerQueue::new();
        q.schedule(ms(500), TimerKind::AutoStart);

        assert_eq!(q.pop_due(ms(499)), None);
        assert_eq!(q.now(), Duration::ZERO);
        assert_eq!(q.pop_due(ms(500)).map(|f| f.kind), Some(TimerKind::AutoStart));
    }

    #[test]
    fn delays_are_relative_to_current_clock() {
        let mut q = TimerQueue::new();
        q.advance_to(ms(1_000));
        q.schedule(ms(250), TimerKind::Emphasis);

        assert_eq!(q.next_due(), Some(ms(1_250)));
    }

    #[test]
    fn cancel_removes_only_that_timer() {
        let mut q = TimerQueue::new();
        let a = q.schedule(ms(10), TimerKind::AutoStart);
        q.schedule(ms(20), TimerKind::Fallback);

        q.cancel(a);
        q.cancel(a);
        q.cancel(TimerHandle::new(999));

        assert_eq!(q.pending().collect::<Vec<_>>(), vec![(ms(20), TimerKind::Fallback)]);
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut q = TimerQueue::new();
        q.advance_to(ms(50));
        q.advance_to(ms(10));
        assert_eq!(q.now(), ms(50));
    }
}
