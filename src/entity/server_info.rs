use super::ids::{BucketId, NodeId, PartitionId, QueueId, ResvId};
use super::node_info::NodeInfo;
use super::queue_info::QueueInfo;
use super::resource_resv::ResourceResv;
use super::state_count::StateCount;
use crate::placement::{NodeBucket, NodePartition};
use crate::resource::ResourceList;
use slotmap::SlotMap;
use std::collections::HashMap;

/// Transient policy flags that a running simulation flips (dedicated time,
/// prime/non-prime) and which must travel with a cloned universe rather than
/// living on the long-lived `SchedulerContext`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyState {
    pub is_ded_time: bool,
    pub is_prime_time: bool,
    /// Server time of the next prime<->nonprime transition, precomputed
    /// from the holidays file. `None` when no holidays file is loaded.
    pub next_prime_transition: Option<i64>,
    /// Mirrors `SchedConfig::backfill_prime`: whether `prime_spill` may be
    /// used to let a job's walltime run past `next_prime_transition`.
    pub backfill_prime: bool,
    /// Mirrors `SchedConfig::prime_spill`, in seconds.
    pub prime_spill: Option<i64>,
}

/// The in-memory snapshot: `server_info` plus every entity it owns.
/// Deliberately holds plain owned arenas (no `Arc<RwLock<_>>>`) so that
/// `#[derive(Clone)]` gives a true deep duplication in O(n) without pointer
/// patching, which the simulation-isolation invariant this scheduler core
/// depends on requires (see DESIGN.md for the rationale).
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub server_time: i64,
    pub server_resources: ResourceList,
    pub policy_state: PolicyState,

    pub nodes: SlotMap<NodeId, NodeInfo>,
    pub queues: SlotMap<QueueId, QueueInfo>,
    pub resvs: SlotMap<ResvId, ResourceResv>,
    pub partitions: SlotMap<PartitionId, NodePartition>,
    pub buckets: SlotMap<BucketId, NodeBucket>,

    pub name_to_node: HashMap<String, NodeId>,
    pub name_to_queue: HashMap<String, QueueId>,
    pub name_to_resv: HashMap<String, ResvId>,

    pub state_count: StateCount,
}

impl ServerInfo {
    pub fn new(server_time: i64) -> Self {
        ServerInfo {
            server_time,
            server_resources: ResourceList::new(),
            policy_state: PolicyState::default(),
            nodes: SlotMap::with_key(),
            queues: SlotMap::with_key(),
            resvs: SlotMap::with_key(),
            partitions: SlotMap::with_key(),
            buckets: SlotMap::with_key(),
            name_to_node: HashMap::new(),
            name_to_queue: HashMap::new(),
            name_to_resv: HashMap::new(),
            state_count: StateCount::default(),
        }
    }

    pub fn add_node(&mut self, build: impl FnOnce(NodeId) -> NodeInfo) -> NodeId {
        let id = self.nodes.insert_with_key(|k| build(k));
        let name = self.nodes[id].name.clone();
        self.name_to_node.insert(name, id);
        id
    }

    pub fn add_queue(&mut self, build: impl FnOnce(QueueId) -> QueueInfo) -> QueueId {
        let id = self.queues.insert_with_key(|k| build(k));
        let name = self.queues[id].name.clone();
        self.name_to_queue.insert(name, id);
        id
    }

    pub fn add_resv(&mut self, build: impl FnOnce(ResvId) -> ResourceResv) -> ResvId {
        let id = self.resvs.insert_with_key(|k| build(k));
        let name = self.resvs[id].name.clone();
        self.name_to_resv.insert(name, id);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
        self.nodes.get(id)
    }
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeInfo> {
        self.nodes.get_mut(id)
    }
    pub fn queue(&self, id: QueueId) -> Option<&QueueInfo> {
        self.queues.get(id)
    }
    pub fn resv(&self, id: ResvId) -> Option<&ResourceResv> {
        self.resvs.get(id)
    }
    pub fn resv_mut(&mut self, id: ResvId) -> Option<&mut ResourceResv> {
        self.resvs.get_mut(id)
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.name_to_node.get(name).copied()
    }

    pub fn running_jobs(&self) -> impl Iterator<Item = &ResourceResv> {
        self.resvs.values().filter(|r| r.is_job() && r.is_running())
    }

    pub fn queued_jobs(&self) -> impl Iterator<Item = &ResourceResv> {
        self.resvs.values().filter(|r| r.is_job() && r.is_queued())
    }

    pub fn confirmed_reservations(&self) -> impl Iterator<Item = &ResourceResv> {
        self.resvs.values().filter(|r| {
            r.is_reservation() && matches!(r.state, super::resource_resv::State::Resv(super::resource_resv::ResvState::Confirmed))
        })
    }

    /// Recomputes `state_count` from current job states. Called after every
    /// mutation that changes a job's state (run, end, preempt).
    pub fn refresh_state_count(&mut self) {
        self.state_count = StateCount::from_jobs(self.resvs.values());
    }

    /// Deep-duplicates the universe for a throwaway simulation. Because
    /// every entity is owned in a plain arena, this is just `Clone::clone`.
    pub fn clone_for_simulation(&self) -> ServerInfo {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_for_simulation_is_observationally_independent() {
        // P3: duplicate-then-mutate-then-free must not affect the original.
        let mut sinfo = ServerInfo::new(0);
        let node_id = sinfo.add_node(|id| NodeInfo::new(id, crate::entity::ids::Rank(1), "n1", "n1", ResourceList::new()));

        let mut clone = sinfo.clone_for_simulation();
        clone.node_mut(node_id).unwrap().state.offline = true;

        assert!(!sinfo.node(node_id).unwrap().state.offline);
        assert!(clone.node(node_id).unwrap().state.offline);
    }
}
