// src/queue.rs
use std::collections::VecDeque;

use crate::event::Event;

/// Bounded FIFO of events discovered but not yet forwarded.
#[derive(Debug, Clone)]
pub struct FeedQueue {
    items: VecDeque<Event>,
    capacity: usize,
}

impl FeedQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Enqueue a batch so that the oldest event is popped first.
    ///
    /// Snapshots arrive newest-first; pass `newest_first = true` and the batch is
    /// reversed. If the batch is larger than the free space, only the newest
    /// events that fit are kept.
    pub fn load(&mut self, events: Vec<Event>, newest_first: bool) {
        let mut events = events;
        if newest_first {
            events.reverse();
        }
        let free = self.capacity - self.items.len();
        let skip = events.len().saturating_sub(free);
        if skip > 0 {
            tracing::warn!(
                target: "feed",
                dropped = skip,
                capacity = self.capacity,
                "batch larger than queue, keeping newest"
            );
        }
        self.items.extend(events.into_iter().skip(skip));
    }

    /// Append at the tail.
    ///
    /// # Panics
    ///
    /// Panics if the queue is full. The monitor only pushes after draining, so a
    /// full queue here is a logic error.
    pub fn push(&mut self, event: Event) {
        assert!(
            self.items.len() < self.capacity,
            "feed queue capacity ({}) exceeded",
            self.capacity
        );
        self.items.push_back(event);
    }

    pub fn try_pop(&mut self) -> Option<Event> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PushEvent;
    use chrono::{TimeZone, Utc};

    fn ev(id: i64, day: u32) -> Event {
        Event::Push(PushEvent {
            id,
            timestamp: Utc.with_ymd_and_hms(2021, 1, day, 0, 0, 0).unwrap(),
            size: 1,
            commits: vec![],
        })
    }

    #[test]
    fn load_reverses_newest_first_batches() {
        let mut q = FeedQueue::new(4);
        q.load(vec![ev(3, 3), ev(2, 2), ev(1, 1)], true);
        let ids: Vec<i64> = std::iter::from_fn(|| q.try_pop()).map(|e| e.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn load_keeps_chronological_batches_as_is() {
        let mut q = FeedQueue::new(4);
        q.load(vec![ev(1, 1), ev(2, 2)], false);
        assert_eq!(q.try_pop().map(|e| e.id()), Some(1));
    }

    #[test]
    fn oversized_batch_keeps_newest() {
        let mut q = FeedQueue::new(2);
        q.load(vec![ev(3, 3), ev(2, 2), ev(1, 1)], true);
        assert_eq!(q.len(), q.capacity());
        assert_eq!(q.try_pop().map(|e| e.id()), Some(2));
        assert_eq!(q.try_pop().map(|e| e.id()), Some(3));
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn push_past_capacity_panics() {
        let mut q = FeedQueue::new(1);
        q.push(ev(1, 1));
        q.push(ev(2, 2));
    }
}
