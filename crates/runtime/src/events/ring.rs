//! Bounded per-session buffer of battle narration.
//!
//! Battle events are too frequent to be worth durable storage. Each session
//! keeps the most recent ones here so late joiners can page back through
//! them with a cursor (the `sequence` of the oldest event they hold).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::types::CombatEvent;

/// One page of ring events.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPage {
    /// Chronological order.
    pub events: Vec<CombatEvent>,
    /// Pass as `before` to fetch the next older page; `None` when exhausted.
    pub next_cursor: Option<u64>,
}

#[derive(Debug)]
pub struct EventRing {
    capacity: usize,
    events: VecDeque<CombatEvent>,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends an event, evicting the oldest one when full.
    pub fn push(&mut self, event: CombatEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Newest-first page of up to `limit` events accepted by `visible`,
    /// strictly older than `before` when given, returned oldest first.
    pub fn page(
        &self,
        before: Option<u64>,
        limit: usize,
        visible: impl Fn(&CombatEvent) -> bool,
    ) -> EventPage {
        let mut candidates = self
            .events
            .iter()
            .rev()
            .filter(|e| before.is_none_or(|cursor| e.sequence < cursor))
            .filter(|e| visible(e));

        let mut events: Vec<CombatEvent> = candidates.by_ref().take(limit).cloned().collect();
        let more = candidates.next().is_some();
        events.reverse();

        let next_cursor = if more {
            events.first().map(|e| e.sequence)
        } else {
            None
        };
        EventPage {
            events,
            next_cursor,
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventContext, EventPayload, EventSeverity};

    fn event(sequence: u64) -> CombatEvent {
        let mut event = CombatEvent::new(
            EventContext::Battle,
            EventSeverity::Info,
            format!("round {sequence}"),
            EventPayload::NewRound {
                round: sequence as u32,
            },
        );
        event.sequence = sequence;
        event
    }

    fn sequences(page: &EventPage) -> Vec<u64> {
        page.events.iter().map(|e| e.sequence).collect()
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut ring = EventRing::new(3);
        for seq in 1..=5 {
            ring.push(event(seq));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(sequences(&ring.page(None, 10, |_| true)), vec![3, 4, 5]);
    }

    #[test]
    fn cursor_pages_walk_backwards() {
        let mut ring = EventRing::new(500);
        for seq in 1..=7 {
            ring.push(event(seq));
        }

        let first = ring.page(None, 3, |_| true);
        assert_eq!(sequences(&first), vec![5, 6, 7]);
        assert_eq!(first.next_cursor, Some(5));

        let second = ring.page(first.next_cursor, 3, |_| true);
        assert_eq!(sequences(&second), vec![2, 3, 4]);

        let last = ring.page(second.next_cursor, 3, |_| true);
        assert_eq!(sequences(&last), vec![1]);
        assert_eq!(last.next_cursor, None);
    }

    #[test]
    fn filter_applies_before_limit() {
        let mut ring = EventRing::new(10);
        for seq in 1..=6 {
            ring.push(event(seq));
        }
        let page = ring.page(None, 2, |e| e.sequence % 2 == 0);
        assert_eq!(sequences(&page), vec![4, 6]);
        assert_eq!(page.next_cursor, Some(4));
    }
}
