use crate::entity::{Arrangement, Chunk, NSpec, NSpecArray, NodeId, NodeInfo, PartitionId, QueueInfo, ResourceResv, ServerInfo};
use crate::eligibility::{ErrorCode, NodeAllocator, SchdError, StatusCode};
use crate::placement::sort_partitions_by_capacity;
use crate::resource::{Availability, ResourceValue};
use std::collections::HashMap;

/// The general path: iterates placement sets (falling back to the full
/// node list if none apply or none fit) and carves chunks off nodes in
/// sorted order, honoring `pack`/`scatter`/`vscatter`/`excl`/`exclhost`.
pub struct GeneralSelector;

impl NodeAllocator for GeneralSelector {
    fn allocate(&self, sinfo: &ServerInfo, qinfo: &QueueInfo, resresv: &ResourceResv) -> Result<NSpecArray, SchdError> {
        check_nodes(sinfo, qinfo, resresv)
    }
}

fn check_nodes(sinfo: &ServerInfo, qinfo: &QueueInfo, resresv: &ResourceResv) -> Result<NSpecArray, SchdError> {
    let partition_ids = select_partition_pool(sinfo, qinfo, resresv);

    if !partition_ids.is_empty() {
        for &pid in &partition_ids {
            let Some(partition) = sinfo.partitions.get(pid) else { continue };
            if let Ok(nspecs) = try_fit_in_nodes(sinfo, &partition.nodes, resresv) {
                return Ok(nspecs);
            }
        }
    }

    // do_not_span_psets is not modeled as a standalone flag; the general
    // path always retries the whole cluster when no single pset sufficed.
    let all_nodes: Vec<NodeId> = sinfo.nodes.keys().collect();
    try_fit_in_nodes(sinfo, &all_nodes, resresv)
}

/// Job `place=group=R` overrides the queue's `node_group_key`, which
/// overrides the server's implicit "all nodes" grouping. Partitions are
/// returned sorted by available capacity, descending.
fn select_partition_pool(sinfo: &ServerInfo, qinfo: &QueueInfo, resresv: &ResourceResv) -> Vec<PartitionId> {
    let group_key = resresv.place.group.as_deref().or(qinfo.node_group_key.as_deref());
    let Some(group_key) = group_key else { return Vec::new() };

    let mut ids: Vec<PartitionId> =
        sinfo.partitions.iter().filter(|(_, p)| p.name.starts_with(group_key) || !p.name.starts_with("__")).map(|(id, _)| id).collect();
    sort_partitions_by_capacity(sinfo, &mut ids);
    ids
}

fn try_fit_in_nodes(sinfo: &ServerInfo, node_ids: &[NodeId], resresv: &ResourceResv) -> Result<NSpecArray, SchdError> {
    let mut sorted_nodes: Vec<NodeId> = node_ids.iter().copied().filter(|&n| sinfo.node(n).map(|n| n.state.is_schedulable()).unwrap_or(false)).collect();
    sorted_nodes.sort_by_key(|&n| sinfo.node(n).map(|n| n.rank).unwrap_or(crate::entity::Rank(0)));

    let mut remaining_capacity: HashMap<NodeId, HashMap<String, ResourceValue>> = HashMap::new();
    let mut claimed_exclusive: std::collections::HashSet<NodeId> = std::collections::HashSet::new();

    let mut nspecs = Vec::new();
    let mut seq_num = 0u32;

    for chunk in &resresv.select {
        let mut remaining = chunk.num_chunks;
        let mut sub_seq = 0u32;
        let mut nodes_used_this_chunk: std::collections::HashSet<NodeId> = std::collections::HashSet::new();

        for &node_id in &sorted_nodes {
            if remaining == 0 {
                break;
            }
            if claimed_exclusive.contains(&node_id) {
                continue;
            }
            if resresv.place.arrangement == Arrangement::Scatter && nodes_used_this_chunk.contains(&node_id) {
                continue;
            }

            let Some(node) = sinfo.node(node_id) else { continue };
            let how_many = fit_count(sinfo, node, chunk, remaining_capacity.get(&node_id));
            if how_many == 0 {
                continue;
            }
            let take = if resresv.place.arrangement == Arrangement::Pack { how_many.min(remaining) } else { 1.min(remaining) };

            charge_node(&mut remaining_capacity, node, chunk, take);
            nodes_used_this_chunk.insert(node_id);
            if resresv.place.is_excl() {
                claimed_exclusive.insert(node_id);
            }

            remaining -= take;
            nspecs.push(NSpec { node: node_id, seq_num, sub_seq_num: sub_seq, end_of_chunk: remaining == 0, resources_used: chunk.resources.clone() });
            sub_seq += 1;
        }

        if remaining > 0 {
            return Err(SchdError::new(ErrorCode::NoFreeNodes, StatusCode::NotRun, "could not satisfy chunk within this node set"));
        }
        seq_num += 1;
    }

    Ok(nspecs)
}

/// How many of `chunk`'s units `node` can still host, given whatever has
/// already been carved off it earlier in this same allocation attempt.
fn fit_count(_sinfo: &ServerInfo, node: &NodeInfo, chunk: &Chunk, charged: Option<&HashMap<String, ResourceValue>>) -> u32 {
    let mut min_fit = u32::MAX;
    for entry in chunk.resources.iter() {
        if !entry.def.flags.consumable {
            continue;
        }
        let Availability::Direct(want) = &entry.available else { continue };
        let Some(mut have) = node.resources.unused(&entry.def.name) else {
            return 0;
        };
        if let Some(charged) = charged {
            if let Some(used) = charged.get(&entry.def.name) {
                have = have.subtract(used).unwrap_or(have);
            }
        }
        let fit = match (want, &have) {
            (ResourceValue::Long(w), ResourceValue::Long(h)) if *w > 0 => (*h / *w).max(0) as u32,
            (ResourceValue::Size(w), ResourceValue::Size(h)) if w.to_bytes() > 0 => (h.to_bytes() / w.to_bytes()) as u32,
            _ => continue,
        };
        min_fit = min_fit.min(fit);
    }
    if min_fit == u32::MAX {
        1
    } else {
        min_fit
    }
}

fn charge_node(remaining_capacity: &mut HashMap<NodeId, HashMap<String, ResourceValue>>, node: &NodeInfo, chunk: &Chunk, take: u32) {
    let entry = remaining_capacity.entry(node.id).or_default();
    for res in chunk.resources.iter() {
        if !res.def.flags.consumable {
            continue;
        }
        let Availability::Direct(want) = &res.available else { continue };
        let taken = match want {
            ResourceValue::Long(n) => ResourceValue::Long(n * take as i64),
            other => other.clone(),
        };
        let slot = entry.entry(res.def.name.clone()).or_insert(ResourceValue::Long(0));
        *slot = slot.add(&taken).unwrap_or_else(|_| taken.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{
        JobState, PlaceSpec, PrevJobInfo, Rank, ResvId, ResvKind, ShareType, Sharing, State,
    };
    use crate::resource::{ResourceDefRegistry, ResourceEntry, ResourceList};
    use slotmap::SlotMap;

    fn node_with_ncpus(sinfo: &mut ServerInfo, reg: &ResourceDefRegistry, name: &str, ncpus: i64) -> NodeId {
        let mut resources = ResourceList::new();
        resources.insert(ResourceEntry::new(reg.get("ncpus").unwrap(), ResourceValue::Long(ncpus)));
        sinfo.add_node(|id| NodeInfo::new(id, Rank(1), name, name, resources))
    }

    fn job_with_chunks(select: Vec<Chunk>, arrangement: Arrangement) -> ResourceResv {
        let mut m: SlotMap<ResvId, ()> = SlotMap::with_key();
        let id = m.insert(());
        ResourceResv {
            id,
            rank: Rank(1),
            name: "genjob".into(),
            owner: "alice".into(),
            queue: None,
            kind: ResvKind::Job,
            resreq: ResourceList::new(),
            select,
            place: PlaceSpec { arrangement, sharing: Sharing::Share, group: None },
            start: None,
            end: None,
            duration: 0,
            state: State::Job(JobState::Queued),
            run_event: None,
            end_event: None,
            allocated: Vec::new(),
            share_group_leader: None,
            share_type: ShareType::Ignore,
            preempt_priority: 0,
            job_priority: 0,
            eligible_time: None,
            fair_share_entity: None,
            shrink_bounds: None,
            preempt_targets: None,
            standing: false,
            is_topjob: false,
            topjob_ineligible: false,
            comment: None,
            prev: PrevJobInfo::default(),
        }
    }

    fn make_chunk(reg: &ResourceDefRegistry, num_chunks: u32, ncpus: i64) -> Chunk {
        let mut resources = ResourceList::new();
        resources.insert(ResourceEntry::new(reg.get("ncpus").unwrap(), ResourceValue::Long(ncpus)));
        Chunk { num_chunks, resources }
    }

    #[test]
    fn scatter_places_at_most_one_chunk_per_node() {
        let reg = ResourceDefRegistry::new();
        let mut sinfo = ServerInfo::new(0);
        node_with_ncpus(&mut sinfo, &reg, "n1", 8);
        node_with_ncpus(&mut sinfo, &reg, "n2", 8);

        let chunk = make_chunk(&reg, 2, 2);
        let job = job_with_chunks(vec![chunk], Arrangement::Scatter);
        let qinfo = QueueInfo::new(Default::default(), Rank(0), "q", crate::entity::QueueType::Execution);

        let nspecs = GeneralSelector.allocate(&sinfo, &qinfo, &job).unwrap();
        let nodes_used: std::collections::HashSet<_> = nspecs.iter().map(|n| n.node).collect();
        assert_eq!(nodes_used.len(), 2, "scatter must spread across distinct nodes");
    }

    #[test]
    fn pack_fits_multiple_chunks_onto_one_node_when_possible() {
        let reg = ResourceDefRegistry::new();
        let mut sinfo = ServerInfo::new(0);
        node_with_ncpus(&mut sinfo, &reg, "n1", 8);

        let chunk = make_chunk(&reg, 4, 2);
        let job = job_with_chunks(vec![chunk], Arrangement::Pack);
        let qinfo = QueueInfo::new(Default::default(), Rank(0), "q", crate::entity::QueueType::Execution);

        let nspecs = GeneralSelector.allocate(&sinfo, &qinfo, &job).unwrap();
        let nodes_used: std::collections::HashSet<_> = nspecs.iter().map(|n| n.node).collect();
        assert_eq!(nodes_used.len(), 1, "pack should collapse onto the fewest nodes");
    }

    #[test]
    fn fails_when_cluster_has_insufficient_total_capacity() {
        let reg = ResourceDefRegistry::new();
        let mut sinfo = ServerInfo::new(0);
        node_with_ncpus(&mut sinfo, &reg, "n1", 2);

        let chunk = make_chunk(&reg, 1, 8);
        let job = job_with_chunks(vec![chunk], Arrangement::Free);
        let qinfo = QueueInfo::new(Default::default(), Rank(0), "q", crate::entity::QueueType::Execution);

        assert!(GeneralSelector.allocate(&sinfo, &qinfo, &job).is_err());
    }
}
