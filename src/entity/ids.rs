use slotmap::new_key_type;
use std::sync::atomic::{AtomicU32, Ordering};

new_key_type! {
    pub struct NodeId;
    pub struct QueueId;
    pub struct ResvId;
    pub struct PartitionId;
    pub struct BucketId;
    pub struct EventId;
}

/// A process-local monotone integer assigned to each entity for stable
/// identity and tiebreaking, independent of its slotmap key (which is only
/// stable within one arena/clone, not across the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rank(pub u32);

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out process-local ranks in increasing order. One instance lives on
/// `SchedulerContext` and is reset each cycle when a fresh snapshot loads.
#[derive(Debug, Default)]
pub struct RankAllocator {
    next: AtomicU32,
}

impl RankAllocator {
    pub fn new() -> Self {
        RankAllocator { next: AtomicU32::new(1) }
    }

    pub fn alloc(&self) -> Rank {
        Rank(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
