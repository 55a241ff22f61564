//! Event buffering, overflow policy and flush triggers.
//!
//! The queue never talks to the network. It tells the tracker *when* a flush
//! is due and hands over a snapshot of its contents with [`EventQueue::take_all`],
//! leaving an empty buffer behind for events tracked while the snapshot is in
//! flight.

use crate::clock::Millis;
use crate::core::event::{Priority, TrackEvent};
use std::collections::VecDeque;

/// Batching and backpressure limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    /// Flush once this many events are buffered; also the payload size cap
    pub batch_size: usize,
    /// Flush once the oldest buffered event is this old
    pub flush_interval_ms: Millis,
    /// Buffered events beyond this are dropped, lowest priority first
    pub max_queue_size: usize,
    /// Delay between a high-priority enqueue and its flush
    pub high_priority_delay_ms: Millis,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval_ms: 5_000,
            max_queue_size: 1_000,
            high_priority_delay_ms: 0,
        }
    }
}

/// A buffered event.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub event: TrackEvent,
    pub enqueued_at: Millis,
    pub attempts: u32,
}

/// Why a flush happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    BatchSize,
    Interval,
    HighPriority,
    Manual,
    Unload,
}

impl std::fmt::Display for FlushReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlushReason::BatchSize => "batch_size",
            FlushReason::Interval => "interval",
            FlushReason::HighPriority => "high_priority",
            FlushReason::Manual => "manual",
            FlushReason::Unload => "unload",
        };
        f.write_str(s)
    }
}

/// FIFO buffer of normalized events.
#[derive(Debug)]
pub struct EventQueue {
    policy: QueuePolicy,
    items: VecDeque<QueueItem>,
    /// Flush deadline armed by a high-priority enqueue
    escalate_at: Option<Millis>,
}

impl EventQueue {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            policy,
            items: VecDeque::new(),
            escalate_at: None,
        }
    }

    pub fn policy(&self) -> &QueuePolicy {
        &self.policy
    }

    /// Buffer an event, returning whatever had to be dropped to stay within
    /// `max_queue_size`.
    ///
    /// Victims are the oldest low-priority items, then the oldest normal ones.
    /// High-priority items are never dropped, so a queue full of them may
    /// exceed the bound.
    pub fn enqueue(&mut self, event: TrackEvent, now: Millis) -> Vec<TrackEvent> {
        if event.priority == Priority::High {
            let at = now.saturating_add(self.policy.high_priority_delay_ms);
            self.escalate_at = Some(self.escalate_at.map_or(at, |current| current.min(at)));
        }

        self.items.push_back(QueueItem {
            event,
            enqueued_at: now,
            attempts: 0,
        });

        let mut dropped = Vec::new();
        while self.items.len() > self.policy.max_queue_size {
            let victim = self
                .oldest_with(Priority::Low)
                .or_else(|| self.oldest_with(Priority::Normal));
            match victim.and_then(|idx| self.items.remove(idx)) {
                Some(item) => dropped.push(item.event),
                None => break,
            }
        }
        dropped
    }

    fn oldest_with(&self, priority: Priority) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.event.priority == priority)
    }

    /// The trigger that makes a flush due at `now`, if any.
    pub fn flush_reason(&self, now: Millis) -> Option<FlushReason> {
        if self.items.is_empty() {
            return None;
        }
        if self.escalate_at.is_some_and(|at| now >= at) {
            return Some(FlushReason::HighPriority);
        }
        if self.items.len() >= self.policy.batch_size {
            return Some(FlushReason::BatchSize);
        }
        match self.items.front() {
            Some(oldest) if now - oldest.enqueued_at >= self.policy.flush_interval_ms => {
                Some(FlushReason::Interval)
            }
            _ => None,
        }
    }

    /// Earliest time at which [`flush_reason`](Self::flush_reason) becomes `Some`.
    pub fn next_deadline(&self) -> Option<Millis> {
        let oldest = self.items.front()?;
        if self.items.len() >= self.policy.batch_size {
            return self.items.back().map(|item| item.enqueued_at);
        }
        let interval = oldest
            .enqueued_at
            .saturating_add(self.policy.flush_interval_ms);
        Some(self.escalate_at.map_or(interval, |at| at.min(interval)))
    }

    /// Remove and return everything buffered: high tier first, then normal,
    /// then low, each in enqueue order.
    pub fn take_all(&mut self) -> Vec<QueueItem> {
        self.escalate_at = None;
        let mut items: Vec<QueueItem> = std::mem::take(&mut self.items).into();
        // Stable sort keeps FIFO order inside each tier.
        items.sort_by(|a, b| b.event.priority.cmp(&a.event.priority));
        items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Buffered events in enqueue order.
    pub fn events(&self) -> impl Iterator<Item = &TrackEvent> {
        self.items.iter().map(|item| &item.event)
    }
}

/// Split a drained snapshot into payload-sized batches, preserving order.
pub fn into_batches(items: Vec<QueueItem>, batch_size: usize) -> Vec<Vec<QueueItem>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for item in items {
        current.push(item);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{EventData, EventType};

    fn event(name: &str, priority: Priority) -> TrackEvent {
        TrackEvent {
            name: name.to_string(),
            event_type: EventType::Custom,
            data: EventData::new(),
            priority,
            timestamp: 0,
            session_id: "s".to_string(),
            page_id: "p".to_string(),
            user_id: None,
        }
    }

    fn policy(batch_size: usize, max_queue_size: usize) -> QueuePolicy {
        QueuePolicy {
            batch_size,
            flush_interval_ms: 1_000,
            max_queue_size,
            high_priority_delay_ms: 0,
        }
    }

    fn names(items: &[QueueItem]) -> Vec<&str> {
        items.iter().map(|i| i.event.name.as_str()).collect()
    }

    #[test]
    fn test_overflow_caps_and_drops_oldest_low_first() {
        let mut queue = EventQueue::new(policy(1_000, 10));
        let mut dropped = Vec::new();
        for i in 0..15 {
            dropped.extend(queue.enqueue(event(&format!("e{i}"), Priority::Low), i));
        }
        assert_eq!(queue.len(), 10);
        let dropped: Vec<_> = dropped.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(dropped, vec!["e0", "e1", "e2", "e3", "e4"]);
        assert_eq!(queue.events().next().map(|e| e.name.as_str()), Some("e5"));
    }

    #[test]
    fn test_overflow_prefers_low_over_normal_and_spares_high() {
        let mut queue = EventQueue::new(policy(1_000, 2));
        queue.enqueue(event("normal", Priority::Normal), 0);
        queue.enqueue(event("low", Priority::Low), 1);
        let dropped = queue.enqueue(event("high", Priority::High), 2);
        assert_eq!(dropped[0].name, "low");

        let dropped = queue.enqueue(event("high2", Priority::High), 3);
        assert_eq!(dropped[0].name, "normal");

        // Only high items left; the bound yields rather than dropping them.
        let dropped = queue.enqueue(event("high3", Priority::High), 4);
        assert!(dropped.is_empty());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_unbounded_delays_saturate() {
        let mut queue = EventQueue::new(QueuePolicy {
            batch_size: 10,
            flush_interval_ms: Millis::MAX,
            max_queue_size: 10,
            high_priority_delay_ms: Millis::MAX,
        });
        let now = 1_700_000_000_000;
        queue.enqueue(event("n", Priority::Normal), now);
        assert_eq!(queue.next_deadline(), Some(Millis::MAX));

        queue.enqueue(event("h", Priority::High), now);
        assert_eq!(queue.next_deadline(), Some(Millis::MAX));
        assert_eq!(queue.flush_reason(now + 60_000), None);
    }

    #[test]
    fn test_take_all_orders_by_tier_fifo_within() {
        let mut queue = EventQueue::new(policy(1_000, 100));
        queue.enqueue(event("l1", Priority::Low), 0);
        queue.enqueue(event("n1", Priority::Normal), 1);
        queue.enqueue(event("h1", Priority::High), 2);
        queue.enqueue(event("l2", Priority::Low), 3);
        queue.enqueue(event("n2", Priority::Normal), 4);
        queue.enqueue(event("h2", Priority::High), 5);

        let items = queue.take_all();
        assert_eq!(names(&items), vec!["h1", "h2", "n1", "n2", "l1", "l2"]);
        assert!(queue.is_empty());
        assert_eq!(queue.flush_reason(10_000), None);
    }

    #[test]
    fn test_flush_triggers() {
        let mut queue = EventQueue::new(policy(3, 100));
        assert_eq!(queue.next_deadline(), None);

        queue.enqueue(event("a", Priority::Normal), 100);
        assert_eq!(queue.flush_reason(100), None);
        assert_eq!(queue.next_deadline(), Some(1_100));
        assert_eq!(queue.flush_reason(1_100), Some(FlushReason::Interval));

        queue.enqueue(event("b", Priority::Normal), 200);
        queue.enqueue(event("c", Priority::Normal), 300);
        assert_eq!(queue.flush_reason(300), Some(FlushReason::BatchSize));
        assert_eq!(queue.next_deadline(), Some(300));
    }

    #[test]
    fn test_high_priority_escalates() {
        let mut queue = EventQueue::new(QueuePolicy {
            high_priority_delay_ms: 50,
            ..policy(10, 100)
        });
        queue.enqueue(event("a", Priority::Normal), 0);
        queue.enqueue(event("boom", Priority::High), 10);
        assert_eq!(queue.next_deadline(), Some(60));
        assert_eq!(queue.flush_reason(59), None);
        assert_eq!(queue.flush_reason(60), Some(FlushReason::HighPriority));

        queue.take_all();
        queue.enqueue(event("b", Priority::Normal), 100);
        assert_eq!(queue.next_deadline(), Some(1_100));
    }

    #[test]
    fn test_into_batches() {
        let mut queue = EventQueue::new(policy(1_000, 100));
        for i in 0..7 {
            queue.enqueue(event(&format!("e{i}"), Priority::Normal), i);
        }
        let batches = into_batches(queue.take_all(), 3);
        assert_eq!(batches.len(), 3);
        assert_eq!(names(&batches[0]), vec!["e0", "e1", "e2"]);
        assert_eq!(names(&batches[2]), vec!["e6"]);
    }
}
