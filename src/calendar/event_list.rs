use super::event::TimedEvent;
use slotmap::{new_key_type, SlotMap};

new_key_type! { pub struct EventListKey; }

/// The calendar: events kept in a slotmap arena plus a separately
/// maintained sorted index. Insertion and removal are `O(n)` in the worst
/// case but the common case (appending near the tail, removing the head
/// after `simulate_events` advances past it) stays cheap, and this needs
/// no unsafe code the way a hand-rolled intrusive linked list would.
#[derive(Debug, Clone, Default)]
pub struct EventList {
    events: SlotMap<EventListKey, TimedEvent>,
    order: Vec<EventListKey>,
    /// Index into `order` of the next event to process.
    cursor: usize,
}

impl EventList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: TimedEvent) -> EventListKey {
        let key = self.events.insert(event);
        let pos = self.order[self.cursor..].partition_point(|&k| self.events[k].cmp_order(&self.events[key]) != std::cmp::Ordering::Greater);
        self.order.insert(self.cursor + pos, key);
        key
    }

    pub fn remove(&mut self, key: EventListKey) -> Option<TimedEvent> {
        if let Some(pos) = self.order.iter().position(|&k| k == key) {
            self.order.remove(pos);
            if pos < self.cursor {
                self.cursor -= 1;
            }
        }
        self.events.remove(key)
    }

    /// The next unprocessed event in timestamp order (END before RUN at
    /// ties), without consuming it.
    pub fn peek_next(&self) -> Option<&TimedEvent> {
        self.order.get(self.cursor).map(|&k| &self.events[k])
    }

    /// Advances past the next event, returning it.
    pub fn take_next(&mut self) -> Option<TimedEvent> {
        let key = *self.order.get(self.cursor)?;
        self.cursor += 1;
        self.events.get(key).cloned()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.order.len()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter_remaining(&self) -> impl Iterator<Item = &TimedEvent> {
        self.order[self.cursor..].iter().map(move |&k| &self.events[k])
    }
}
