//! Virtual clock with cancellable delayed actions.
//!
//! Nothing here sleeps. Callers move the clock forward with [`Timeline::advance`]
//! and receive every action that fell due, in due order. Actions scheduled at
//! the same instant come back in insertion order.

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled<A> {
    pub due: Duration,
    pub generation: u64,
    pub action: A,
}

#[derive(Debug, Clone)]
pub struct Timeline<A> {
    now: Duration,
    sequence: u64,
    pending: BTreeMap<(Duration, u64), Scheduled<A>>,
}

impl<A> Default for Timeline<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Timeline<A> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            sequence: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, delay: Duration, generation: u64, action: A) {
        let due = self.now + delay;
        self.sequence += 1;
        self.pending.insert(
            (due, self.sequence),
            Scheduled {
                due,
                generation,
                action,
            },
        );
    }

    /// Moves the clock forward and drains everything now due.
    pub fn advance(&mut self, by: Duration) -> Vec<Scheduled<A>> {
        let target = self.now + by;
        let mut due = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().0 > target {
                break;
            }
            let scheduled = entry.remove();
            self.now = self.now.max(scheduled.due);
            due.push(scheduled);
        }
        self.now = target;
        due
    }

    /// Pops only the earliest pending action, moving the clock to its due
    /// time. Lets callers react before later actions are released.
    pub fn pop_next(&mut self) -> Option<Scheduled<A>> {
        let (_, scheduled) = self.pending.pop_first()?;
        self.now = self.now.max(scheduled.due);
        Some(scheduled)
    }

    /// Time until the next pending action, if any.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending
            .first_key_value()
            .map(|((due, _), _)| due.saturating_sub(self.now))
    }

    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn releases_actions_in_due_then_insertion_order() {
        let mut timeline = Timeline::new();
        timeline.schedule(ms(400), 1, "b");
        timeline.schedule(ms(100), 1, "a");
        timeline.schedule(ms(400), 1, "c");

        assert!(timeline.advance(ms(99)).is_empty());
        assert_eq!(timeline.next_due(), Some(ms(1)));

        let due: Vec<_> = timeline
            .advance(ms(301))
            .into_iter()
            .map(|scheduled| scheduled.action)
            .collect();
        assert_eq!(due, vec!["a", "b", "c"]);
        assert_eq!(timeline.now(), ms(400));
        assert!(timeline.is_empty());
    }

    #[test]
    fn delays_are_relative_to_current_clock() {
        let mut timeline = Timeline::new();
        timeline.advance(ms(1000));
        timeline.schedule(ms(200), 3, ());
        let next = timeline.pop_next().unwrap();
        assert_eq!(next.due, ms(1200));
        assert_eq!(next.generation, 3);
        assert_eq!(timeline.now(), ms(1200));
    }

    #[test]
    fn cancel_all_drops_pending() {
        let mut timeline = Timeline::new();
        timeline.schedule(ms(5), 0, 1);
        timeline.schedule(ms(10), 0, 2);
        assert_eq!(timeline.cancel_all(), 2);
        assert!(timeline.advance(ms(100)).is_empty());
        assert_eq!(timeline.next_due(), None);
    }
}
