//! Simulated-time priority queue. Holds no wall-clock knowledge.

use std::collections::BinaryHeap;

use crate::combat::event::{EventKind, ScheduledEvent};

#[derive(Debug, Default)]
pub struct EventScheduler {
    queue: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `kind` at `execute_at` and returns its sequence number.
    ///
    /// # Panics
    /// When `execute_at` is not finite.
    pub fn schedule(&mut self, execute_at: f64, kind: EventKind) -> u64 {
        assert!(execute_at.is_finite(), "event time must be finite");
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.queue.push(ScheduledEvent {
            execute_at,
            seq,
            kind,
        });
        seq
    }

    /// Puts back an event that was popped but not consumed, keeping its place.
    pub fn requeue(&mut self, event: ScheduledEvent) {
        self.queue.push(event);
    }

    pub fn pop_next(&mut self) -> Option<ScheduledEvent> {
        self.queue.pop()
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.queue.peek().map(|event| event.execute_at)
    }

    pub fn count(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
