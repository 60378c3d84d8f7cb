use super::bucket::resource_signature;
use crate::entity::{BucketId, NodeId, PartitionId, QueueId, Rank, ServerInfo};
use crate::resource::ResourceList;

pub const ALLPART_NAME: &str = "__allpart__";
pub const HOSTSETS_NAME: &str = "__hostsets__";

/// A maximal set of nodes sharing the value of a named grouping resource.
/// `allpart` (all nodes) and `hostsets` (grouped by `host`) are
/// special-named partitions built alongside the resource-keyed ones.
#[derive(Debug, Clone)]
pub struct NodePartition {
    pub rank: Rank,
    pub name: String,
    pub nodes: Vec<NodeId>,
    pub aggregated: ResourceList,
    pub buckets: Vec<BucketId>,
}

impl NodePartition {
    pub fn total_ncpus(&self, sinfo: &ServerInfo) -> i64 {
        self.nodes
            .iter()
            .filter_map(|&n| sinfo.node(n))
            .filter_map(|n| n.resources.get("ncpus"))
            .filter_map(|e| match &e.available {
                crate::resource::Availability::Direct(crate::resource::ResourceValue::Long(v)) => Some(*v),
                _ => None,
            })
            .sum()
    }
}

/// Breaks nodes apart into placement sets, keyed by the value each node
/// carries for `resname` (e.g. `resources_available.switch`).
pub fn create_node_partitions(
    sinfo: &mut ServerInfo,
    node_ids: &[NodeId],
    resname: &str,
    rank_alloc: &crate::entity::RankAllocator,
) -> Vec<PartitionId> {
    use std::collections::HashMap;
    let mut groups: HashMap<String, Vec<NodeId>> = HashMap::new();

    for &nid in node_ids {
        let Some(node) = sinfo.node(nid) else { continue };
        let key = node
            .resources
            .get(resname)
            .map(|e| match &e.available {
                crate::resource::Availability::Direct(v) => v.encode(),
                crate::resource::Availability::Indirect(_) => String::new(),
            })
            .unwrap_or_default();
        groups.entry(key).or_default().push(nid);
    }

    let mut ids = Vec::new();
    for (name, nodes) in groups {
        if name.is_empty() {
            continue;
        }
        let id = build_partition(sinfo, name, nodes, rank_alloc);
        ids.push(id);
    }
    ids
}

/// Builds the special `allpart` partition spanning every schedulable node.
pub fn create_allpart(sinfo: &mut ServerInfo, node_ids: &[NodeId], rank_alloc: &crate::entity::RankAllocator) -> PartitionId {
    build_partition(sinfo, ALLPART_NAME.to_string(), node_ids.to_vec(), rank_alloc)
}

/// Builds `hostsets`: one partition per distinct `host`.
pub fn create_hostsets(sinfo: &mut ServerInfo, node_ids: &[NodeId], rank_alloc: &crate::entity::RankAllocator) -> Vec<PartitionId> {
    use std::collections::HashMap;
    let mut groups: HashMap<String, Vec<NodeId>> = HashMap::new();
    for &nid in node_ids {
        if let Some(node) = sinfo.node(nid) {
            groups.entry(node.host.clone()).or_default().push(nid);
        }
    }
    groups.into_iter().map(|(name, nodes)| build_partition(sinfo, format!("{HOSTSETS_NAME}:{name}"), nodes, rank_alloc)).collect()
}

fn build_partition(sinfo: &mut ServerInfo, name: String, nodes: Vec<NodeId>, rank_alloc: &crate::entity::RankAllocator) -> PartitionId {
    let rank = rank_alloc.alloc();
    sinfo.partitions.insert(NodePartition { rank, name, nodes, aggregated: ResourceList::new(), buckets: Vec::new() })
}

/// Groups the nodes of one partition into buckets of identical resource
/// signature, queue affinity, and priority.
pub fn build_buckets_for_partition(sinfo: &mut ServerInfo, partition_id: PartitionId, rank_alloc: &crate::entity::RankAllocator) {
    use std::collections::HashMap;

    let Some(partition) = sinfo.partitions.get(partition_id) else { return };
    let nodes = partition.nodes.clone();

    let mut groups: HashMap<(String, Option<QueueId>), Vec<NodeId>> = HashMap::new();
    for nid in nodes {
        let Some(node) = sinfo.node(nid) else { continue };
        let sig = resource_signature(&node.resources);
        groups.entry((sig, node.queue)).or_default().push(nid);
    }

    let mut bucket_ids = Vec::new();
    for ((sig, queue), group_nodes) in groups {
        let rank = rank_alloc.alloc();
        let bucket = super::bucket::NodeBucket::new(rank, partition_id, sig, queue, 0, group_nodes);
        let bucket_id = sinfo.buckets.insert(bucket);
        bucket_ids.push(bucket_id);
    }

    if let Some(partition) = sinfo.partitions.get_mut(partition_id) {
        partition.buckets = bucket_ids;
    }
}

/// Sorts partitions by available resources descending (most capacity
/// first).
pub fn sort_partitions_by_capacity(sinfo: &ServerInfo, ids: &mut [PartitionId]) {
    ids.sort_by(|&a, &b| {
        let ca = sinfo.partitions.get(a).map(|p| p.total_ncpus(sinfo)).unwrap_or(0);
        let cb = sinfo.partitions.get(b).map(|p| p.total_ncpus(sinfo)).unwrap_or(0);
        cb.cmp(&ca)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{NodeInfo, RankAllocator};
    use crate::resource::{ResourceDefRegistry, ResourceEntry, ResourceValue};

    fn make_node(sinfo: &mut ServerInfo, reg: &ResourceDefRegistry, name: &str, ncpus: i64, switch: &str) -> NodeId {
        let mut resources = ResourceList::new();
        resources.insert(ResourceEntry::new(reg.get("ncpus").unwrap(), ResourceValue::Long(ncpus)));
        resources.insert(ResourceEntry::new(reg.get("switch").unwrap(), ResourceValue::Str(switch.to_string())));
        sinfo.add_node(|id| NodeInfo::new(id, crate::entity::Rank(1), name, name, resources))
    }

    #[test]
    fn partitions_group_nodes_by_resource_value() {
        let reg = ResourceDefRegistry::new();
        let mut sinfo = ServerInfo::new(0);
        let n1 = make_node(&mut sinfo, &reg, "n1", 4, "A");
        let n2 = make_node(&mut sinfo, &reg, "n2", 4, "A");
        let n3 = make_node(&mut sinfo, &reg, "n3", 4, "B");
        let alloc = RankAllocator::new();

        let ids = create_node_partitions(&mut sinfo, &[n1, n2, n3], "switch", &alloc);
        assert_eq!(ids.len(), 2);
        let total: usize = ids.iter().map(|&id| sinfo.partitions[id].nodes.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn buckets_split_by_resource_signature() {
        let reg = ResourceDefRegistry::new();
        let mut sinfo = ServerInfo::new(0);
        let n1 = make_node(&mut sinfo, &reg, "n1", 4, "A");
        let n2 = make_node(&mut sinfo, &reg, "n2", 8, "A");
        let alloc = RankAllocator::new();
        let pid = create_allpart(&mut sinfo, &[n1, n2], &alloc);
        build_buckets_for_partition(&mut sinfo, pid, &alloc);
        let buckets = sinfo.partitions[pid].buckets.clone();
        assert_eq!(buckets.len(), 2, "differing ncpus should yield distinct buckets");
    }
}
