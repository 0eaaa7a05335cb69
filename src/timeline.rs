use std::collections::BTreeMap;
use std::time::Duration;

/// Delayed events on a virtual clock. Time is whatever the owner says it is
/// (usually time since mount), so tests can jump around without sleeping.
///
/// Events due at the same instant come out in the order they were scheduled.
/// Once closed, every pending event is dropped and nothing new is accepted.
#[derive(Debug)]
pub(crate) struct Timeline<E> {
    queue: BTreeMap<(Duration, u64), E>,
    next_id: u64,
    closed: bool,
}

impl<E> Default for Timeline<E> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            next_id: 0,
            closed: false,
        }
    }
}

impl<E> Timeline<E> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns false if the timeline has been closed.
    pub(crate) fn schedule(&mut self, at: Duration, event: E) -> bool {
        if self.closed {
            return false;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.queue.insert((at, id), event);
        true
    }

    /// Removes and returns the earliest event due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<(Duration, E)> {
        let key = *self.queue.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.queue.remove(&key).map(|e| (key.0, e))
    }

    /// Cancels everything pending and refuses further scheduling.
    pub(crate) fn close(&mut self) -> usize {
        self.closed = true;
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}
