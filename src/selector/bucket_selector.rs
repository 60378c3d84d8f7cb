use crate::entity::{Arrangement, Chunk, NSpec, NSpecArray, NodeId, QueueInfo, ResourceResv, ServerInfo};
use crate::eligibility::{ErrorCode, NodeAllocator, SchdError, StatusCode};
use crate::placement::{NodeBucket, PoolBitmap};
use crate::resource::{Availability, ResourceValue};

/// The `map_buckets` fast path: applies when the job is exclusive, not
/// packed, and not targeting specific nodes. Operates over `ServerInfo`'s
/// precomputed buckets instead of scanning every node.
pub struct BucketSelector;

impl BucketSelector {
    /// Whether the fast path is eligible for this job at all. Reservations
    /// and `pack` placement always fall
    /// through to the general path.
    pub fn applies(resresv: &ResourceResv) -> bool {
        resresv.place.is_excl() && resresv.place.arrangement != Arrangement::Pack && resresv.kind == crate::entity::ResvKind::Job
    }
}

impl NodeAllocator for BucketSelector {
    fn allocate(&self, sinfo: &ServerInfo, _qinfo: &QueueInfo, resresv: &ResourceResv) -> Result<NSpecArray, SchdError> {
        map_buckets(sinfo, resresv)
    }
}

/// How many of `chunk`'s chunks a single node sampled from a bucket can
/// host, based on its consumable resources. Every node in a bucket shares
/// the same signature, so sampling the first is representative.
fn chunks_per_node(sinfo: &ServerInfo, node: NodeId, chunk: &Chunk) -> u64 {
    let Some(node) = sinfo.node(node) else { return 0 };
    let mut min_fit = u64::MAX;
    for entry in chunk.resources.iter() {
        if !entry.def.flags.consumable {
            continue;
        }
        let Availability::Direct(want) = &entry.available else { continue };
        let Some(have) = node.resources.unused(&entry.def.name) else { return 0 };
        let fit = match (want, &have) {
            (ResourceValue::Long(w), ResourceValue::Long(h)) if *w > 0 => (*h / *w).max(0) as u64,
            (ResourceValue::Size(w), ResourceValue::Size(h)) if w.to_bytes() > 0 => (h.to_bytes() / w.to_bytes()) as u64,
            _ => continue,
        };
        min_fit = min_fit.min(fit);
    }
    if min_fit == u64::MAX {
        1
    } else {
        min_fit
    }
}

/// Draws chunk-units from one pool of a bucket, skipping nodes already
/// drawn elsewhere in this bucket and any `fits` rejects. Pushes one
/// `NSpec` per chunk-unit a drawn node hosts, `end_of_chunk` set on
/// whichever nspec brings `*remaining` to zero.
#[allow(clippy::too_many_arguments)]
fn draw_from_pool(
    pool: &PoolBitmap,
    bucket: &NodeBucket,
    per_node: u64,
    already_drawn: &mut Vec<usize>,
    remaining: &mut u64,
    seq_num: u32,
    sub_seq_num: &mut u32,
    chunk: &Chunk,
    nspecs: &mut Vec<NSpec>,
    mut fits: impl FnMut(NodeId) -> bool,
) {
    let mut local_idx = 0;
    while *remaining > 0 && local_idx < bucket.total {
        if already_drawn.contains(&local_idx) || !pool.working.test(local_idx) {
            local_idx += 1;
            continue;
        }
        let node_id = bucket.node_index[local_idx];
        if !fits(node_id) {
            local_idx += 1;
            continue;
        }
        already_drawn.push(local_idx);
        let hosted = per_node.min(*remaining);
        for _ in 0..hosted {
            *remaining -= 1;
            nspecs.push(NSpec { node: node_id, seq_num, sub_seq_num: *sub_seq_num, end_of_chunk: *remaining == 0, resources_used: chunk.resources.clone() });
            *sub_seq_num += 1;
        }
        local_idx += 1;
    }
}

fn map_buckets(sinfo: &ServerInfo, resresv: &ResourceResv) -> Result<NSpecArray, SchdError> {
    let mut nspecs = Vec::new();
    let mut seq_num = 0u32;

    // Work on a local working-pool snapshot so a failure partway through
    // never mutates the caller's truth/working bitmaps.
    let mut drawn_per_bucket: std::collections::HashMap<crate::entity::BucketId, Vec<usize>> = std::collections::HashMap::new();

    for chunk in &resresv.select {
        let mut remaining = chunk.num_chunks as u64;
        let mut sub_seq_num = 0u32;
        let mut candidates: Vec<_> = sinfo
            .buckets
            .iter()
            .filter(|(_, b)| resresv.queue.is_none() || b.queue_affinity.is_none() || b.queue_affinity == resresv.queue)
            .map(|(id, b)| (id, b))
            .collect();
        candidates.sort_by_key(|(_, b)| b.priority);
        candidates.reverse();

        let total_capacity: u64 = candidates
            .iter()
            .map(|(id, b)| {
                let drawn = drawn_per_bucket.get(id).map(|v| v.len()).unwrap_or(0);
                let usable = b.free_pool.working.popcount() + b.busy_later_pool.working.popcount();
                let free = usable.saturating_sub(drawn);
                free as u64 * b.node_index.first().map(|&n| chunks_per_node(sinfo, n, chunk)).unwrap_or(1)
            })
            .sum();
        if total_capacity < remaining {
            return Err(SchdError::new(ErrorCode::InsufficientResource, StatusCode::NotRun, "insufficient bucket capacity")
                .with_resource(chunk.resources.iter().next().map(|e| e.def.name.clone()).unwrap_or_default()));
        }

        for (bucket_id, bucket) in &candidates {
            if remaining == 0 {
                break;
            }
            let per_node = bucket.node_index.first().map(|&n| chunks_per_node(sinfo, n, chunk)).unwrap_or(1).max(1);
            let already_drawn = drawn_per_bucket.entry(*bucket_id).or_default();

            draw_from_pool(&bucket.busy_later_pool, bucket, per_node, already_drawn, &mut remaining, seq_num, &mut sub_seq_num, chunk, &mut nspecs, |node_id| {
                sinfo.node(node_id).and_then(|n| n.next_event_time(|_| None)).is_none_or(|t| t - sinfo.server_time >= resresv.duration)
            });
            draw_from_pool(&bucket.free_pool, bucket, per_node, already_drawn, &mut remaining, seq_num, &mut sub_seq_num, chunk, &mut nspecs, |_| true);
        }

        if remaining > 0 {
            return Err(SchdError::new(ErrorCode::NoFreeNodes, StatusCode::NotRun, "ran out of free nodes while allocating chunk"));
        }
        seq_num += 1;
    }

    Ok(nspecs)
}
