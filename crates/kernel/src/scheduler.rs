use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use crate::world::World;

/// Deferred work run on the world's execution context.
pub type Callback = Box<dyn FnOnce(&mut World)>;

/// Cancellation token for a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Virtual clock plus deferred callbacks.
///
/// Time only moves when the world advances it, so every timer fires at an
/// exact, reproducible instant. Timers fire in deadline order; equal
/// deadlines fire in the order they were armed.
#[derive(Default)]
pub struct Scheduler {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<(Duration, u64), Callback>,
    deadlines: BTreeMap<u64, Duration>,
    dispatched: VecDeque<Callback>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("pending_timers", &self.timers.len())
            .field("dispatched", &self.dispatched.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulation time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Run `callback` once `delay` has elapsed on the simulation clock.
    pub fn run_after(
        &mut self,
        delay: Duration,
        callback: impl FnOnce(&mut World) + 'static,
    ) -> TimerHandle {
        self.run_at(self.now + delay, callback)
    }

    /// Run `callback` at an absolute simulation time. A deadline in the past
    /// fires on the next update.
    pub fn run_at(
        &mut self,
        deadline: Duration,
        callback: impl FnOnce(&mut World) + 'static,
    ) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert((deadline, id), Box::new(callback));
        self.deadlines.insert(id, deadline);
        TimerHandle(id)
    }

    /// Cancel a pending timer. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => self.timers.remove(&(deadline, handle.0)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Queue `callback` to run at the start of the next update.
    pub fn dispatch(&mut self, callback: impl FnOnce(&mut World) + 'static) {
        self.dispatched.push_back(Box::new(callback));
    }

    pub(crate) fn pop_dispatched(&mut self) -> Option<Callback> {
        self.dispatched.pop_front()
    }

    /// Earliest timer due at or before `until`, with its deadline.
    pub(crate) fn pop_due(&mut self, until: Duration) -> Option<(Duration, Callback)> {
        let (&(deadline, id), _) = self.timers.first_key_value()?;
        if deadline > until {
            return None;
        }
        self.deadlines.remove(&id);
        self.timers
            .remove(&(deadline, id))
            .map(|callback| (deadline, callback))
    }

    pub(crate) fn set_now(&mut self, now: Duration) {
        // never runs backwards
        self.now = self.now.max(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn due_timers_pop_in_deadline_then_arming_order() {
        let mut s = Scheduler::new();
        let late = s.run_after(secs(5), |_| {});
        let first = s.run_after(secs(2), |_| {});
        let second = s.run_after(secs(2), |_| {});
        assert_eq!(s.pending_timers(), 3);

        assert!(s.pop_due(secs(1)).is_none());
        let (d1, _) = s.pop_due(secs(10)).unwrap();
        assert_eq!(d1, secs(2));
        assert!(!s.is_pending(first));
        assert!(s.is_pending(second));
        let (d2, _) = s.pop_due(secs(10)).unwrap();
        assert_eq!(d2, secs(2));
        let (d3, _) = s.pop_due(secs(10)).unwrap();
        assert_eq!(d3, secs(5));
        assert!(!s.is_pending(late));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut s = Scheduler::new();
        let h = s.run_after(secs(1), |_| {});
        assert!(s.cancel(h));
        assert!(!s.cancel(h));
        assert!(s.pop_due(secs(100)).is_none());
    }

    #[test]
    fn cancel_after_fire_is_a_no_op() {
        let mut s = Scheduler::new();
        let h = s.run_after(secs(1), |_| {});
        assert!(s.pop_due(secs(1)).is_some());
        assert!(!s.cancel(h));
    }

    #[test]
    fn delays_are_relative_to_the_clock() {
        let mut s = Scheduler::new();
        s.set_now(secs(10));
        s.run_after(secs(3), |_| {});
        assert!(s.pop_due(secs(12)).is_none());
        assert_eq!(s.pop_due(secs(13)).map(|(d, _)| d), Some(secs(13)));
    }

    #[test]
    fn clock_is_monotonic() {
        let mut s = Scheduler::new();
        s.set_now(secs(4));
        s.set_now(secs(2));
        assert_eq!(s.now(), secs(4));
    }
}
