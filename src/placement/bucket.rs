use super::bitmap::DynamicBitmap;
use crate::entity::{NodeId, PartitionId, QueueId, Rank};
use crate::resource::ResourceList;

/// A string signature built from a node's consumable/host resources, used
/// to decide whether two nodes belong in the same bucket.
pub fn resource_signature(resources: &ResourceList) -> String {
    let mut pairs: Vec<(String, String)> = resources
        .iter()
        .filter(|e| e.def.flags.consumable || e.def.flags.host)
        .map(|e| {
            let val = match &e.available {
                crate::resource::Availability::Direct(v) => v.encode(),
                crate::resource::Availability::Indirect(_) => "indirect".to_string(),
            };
            (e.def.name.clone(), val)
        })
        .collect();
    pairs.sort();
    pairs.into_iter().map(|(n, v)| format!("{n}={v}")).collect::<Vec<_>>().join(":")
}

/// A bitmap kept in two copies: `truth` (committed state) and `working`
/// (mutated during a try, then either committed or discarded).
#[derive(Debug, Clone, Default)]
pub struct PoolBitmap {
    pub truth: DynamicBitmap,
    pub working: DynamicBitmap,
}

impl PoolBitmap {
    pub fn with_len(len: usize) -> Self {
        PoolBitmap { truth: DynamicBitmap::with_len(len), working: DynamicBitmap::with_len(len) }
    }

    pub fn commit(&mut self) {
        self.truth = self.working.clone();
    }

    pub fn reset_working(&mut self) {
        self.working = self.truth.clone();
    }
}

/// Nodes within one placement set with identical resource signatures
/// (ignoring host/vnode names) sharing one queue affinity and priority.
#[derive(Debug, Clone)]
pub struct NodeBucket {
    pub rank: Rank,
    pub partition: PartitionId,
    pub res_spec: String,
    pub queue_affinity: Option<QueueId>,
    pub priority: i64,
    pub total: usize,

    pub free_pool: PoolBitmap,
    pub busy_later_pool: PoolBitmap,
    pub busy_pool: PoolBitmap,

    /// bucket-local index -> global NodeId.
    pub node_index: Vec<NodeId>,
}

impl NodeBucket {
    pub fn new(rank: Rank, partition: PartitionId, res_spec: String, queue_affinity: Option<QueueId>, priority: i64, nodes: Vec<NodeId>) -> Self {
        let total = nodes.len();
        let mut free_pool = PoolBitmap::with_len(total);
        for i in 0..total {
            free_pool.truth.set(i);
            free_pool.working.set(i);
        }
        NodeBucket {
            rank,
            partition,
            res_spec,
            queue_affinity,
            priority,
            total,
            free_pool,
            busy_later_pool: PoolBitmap::with_len(total),
            busy_pool: PoolBitmap::with_len(total),
            node_index: nodes,
        }
    }

    pub fn local_index_of(&self, node: NodeId) -> Option<usize> {
        self.node_index.iter().position(|&n| n == node)
    }

    /// The three truth pools are pairwise disjoint and their union covers
    /// every node in the bucket exactly once.
    pub fn check_invariant(&self) -> bool {
        let union_count = self.free_pool.truth.popcount() + self.busy_later_pool.truth.popcount() + self.busy_pool.truth.popcount();
        if union_count != self.total {
            return false;
        }
        !self.free_pool.truth.intersects(&self.busy_later_pool.truth)
            && !self.free_pool.truth.intersects(&self.busy_pool.truth)
            && !self.busy_later_pool.truth.intersects(&self.busy_pool.truth)
    }

    /// Moves a node from `free`/`busy_later` into `busy` in the working
    /// copies.
    pub fn move_to_busy_working(&mut self, local_index: usize) {
        self.free_pool.working.clear_bit(local_index);
        self.busy_later_pool.working.clear_bit(local_index);
        self.busy_pool.working.set(local_index);
    }

    pub fn commit_working(&mut self) {
        self.free_pool.commit();
        self.busy_later_pool.commit();
        self.busy_pool.commit();
    }

    pub fn reset_working(&mut self) {
        self.free_pool.reset_working();
        self.busy_later_pool.reset_working();
        self.busy_pool.reset_working();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ids::test_support::dummy_node_id;

    #[test]
    fn new_bucket_starts_fully_free_and_satisfies_invariant() {
        let nodes = vec![dummy_node_id(), dummy_node_id(), dummy_node_id()];
        let partition_id: PartitionId = {
            let mut m: slotmap::SlotMap<PartitionId, ()> = slotmap::SlotMap::with_key();
            m.insert(())
        };
        let bucket = NodeBucket::new(Rank(1), partition_id, "ncpus=4".into(), None, 0, nodes);
        assert!(bucket.check_invariant());
        assert_eq!(bucket.free_pool.truth.popcount(), 3);
    }

    #[test]
    fn moving_a_node_to_busy_preserves_disjointness_after_commit() {
        let nodes = vec![dummy_node_id(), dummy_node_id()];
        let partition_id: PartitionId = {
            let mut m: slotmap::SlotMap<PartitionId, ()> = slotmap::SlotMap::with_key();
            m.insert(())
        };
        let mut bucket = NodeBucket::new(Rank(1), partition_id, "ncpus=4".into(), None, 0, nodes);
        bucket.move_to_busy_working(0);
        bucket.commit_working();
        assert!(bucket.check_invariant());
        assert!(bucket.busy_pool.truth.test(0));
        assert!(!bucket.free_pool.truth.test(0));
    }
}
