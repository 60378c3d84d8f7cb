use super::ids::{BucketId, EventId, NodeId, PartitionId, QueueId, Rank, ResvId};
use crate::resource::ResourceList;

/// Node state bits. A node can be several of these simultaneously
/// (e.g. `offline` and `down`), so this is a plain flag struct rather than
/// a single enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStateFlags {
    pub free: bool,
    pub offline: bool,
    pub down: bool,
    pub stale: bool,
    pub sleeping: bool,
    pub provisioning: bool,
    pub exclusive: bool,
    pub resv_excl: bool,
}

impl NodeStateFlags {
    pub fn free() -> Self {
        NodeStateFlags { free: true, ..Default::default() }
    }

    /// A node is usable for new placement if it isn't down, offline, stale,
    /// or already claimed exclusively.
    pub fn is_schedulable(&self) -> bool {
        !self.down && !self.offline && !self.stale && !self.exclusive && !self.resv_excl
    }
}

#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub rank: Rank,
    pub name: String,
    pub host: String,
    pub state: NodeStateFlags,
    pub resources: ResourceList,
    /// Queue this node is exclusively assigned to, if any.
    pub queue: Option<QueueId>,
    pub running: Vec<ResvId>,
    pub partition: Option<PartitionId>,
    pub bucket: Option<BucketId>,
    /// Events in the global calendar that touch this node, ordered
    /// identically to the calendar. Kept as a back-pointer list for
    /// O(1)-ish lookup of "what happens next on this node".
    pub node_events: Vec<EventId>,
    /// Current Application Operating Environment, for provisioning checks.
    pub current_aoe: Option<String>,
    pub provisionable: bool,
}

impl NodeInfo {
    pub fn new(id: NodeId, rank: Rank, name: impl Into<String>, host: impl Into<String>, resources: ResourceList) -> Self {
        NodeInfo {
            id,
            rank,
            name: name.into(),
            host: host.into(),
            state: NodeStateFlags::free(),
            resources,
            queue: None,
            running: Vec::new(),
            partition: None,
            bucket: None,
            node_events: Vec::new(),
            current_aoe: None,
            provisionable: false,
        }
    }

    pub fn next_event_time(&self, lookup: impl Fn(EventId) -> Option<i64>) -> Option<i64> {
        self.node_events.iter().filter_map(|e| lookup(*e)).min()
    }
}
