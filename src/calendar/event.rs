use crate::entity::ResvId;

/// What kind of timeline event this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A job or reservation starts consuming resources.
    Run(ResvId),
    /// A job or reservation finishes and releases resources.
    End(ResvId),
    /// Dedicated time begins or ends.
    DedTimeStart,
    DedTimeEnd,
    /// A prime/nonprime transition, lazily inserted when the walk is
    /// about to cross it.
    PolicyChange,
    /// A sleeping node wakes up after provisioning completes.
    NodeUp(crate::entity::NodeId),
}

/// One entry of the calendar: a timestamp and what happens there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub time: i64,
    pub kind: EventKind,
}

impl TimedEvent {
    pub fn new(time: i64, kind: EventKind) -> Self {
        TimedEvent { time, kind }
    }

    /// END-before-RUN tiebreak at equal timestamps, ranked low-to-high for
    /// the ascending event list.
    fn order_rank(&self) -> u8 {
        match self.kind {
            EventKind::End(_) => 0,
            EventKind::DedTimeEnd => 0,
            EventKind::PolicyChange => 1,
            EventKind::NodeUp(_) => 1,
            EventKind::DedTimeStart => 2,
            EventKind::Run(_) => 2,
        }
    }

    pub fn cmp_order(&self, other: &TimedEvent) -> std::cmp::Ordering {
        self.time.cmp(&other.time).then(self.order_rank().cmp(&other.order_rank()))
    }
}
