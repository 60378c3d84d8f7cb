use super::sort_info::{find_node_amount, find_resresv_amount, Direction, SortInfo};
use crate::entity::{NodeInfo, Rank, ResourceResv};
use crate::fairshare::FairshareTree;
use std::cmp::Ordering;

/// `multi_sort`: applies each key of `keys` in order, returning the first
/// non-equal comparison; falls back to `rank` (insertion order) so the
/// sort is stable across cycles even when every configured key ties.
pub fn multi_sort_jobs(keys: &[SortInfo], a: &ResourceResv, b: &ResourceResv, fairshare: Option<&FairshareTree>) -> Ordering {
    for si in keys {
        let fa = fairshare_perc_of(a, fairshare);
        let fb = fairshare_perc_of(b, fairshare);
        let va = find_resresv_amount(a, &si.key, fa);
        let vb = find_resresv_amount(b, &si.key, fb);
        let ord = va.partial_cmp(&vb).unwrap_or(Ordering::Equal);
        let ord = if si.direction == Direction::Desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.rank.cmp(&b.rank)
}

/// How deserving `resresv`'s fairshare entity currently is: the inverse of
/// its `usage_factor`, so a higher result means less usage relative to its
/// entitlement. Two entities with identical shares but different usage
/// only diverge through usage_factor, never through tree_percentage alone,
/// so FairSharePerc sorts on this rather than raw share size.
fn fairshare_perc_of(resresv: &ResourceResv, fairshare: Option<&FairshareTree>) -> Option<f64> {
    let tree = fairshare?;
    let name = resresv.fair_share_entity.as_deref()?;
    let id = tree.find(name)?;
    let usage_factor = tree.nodes[id].usage_factor;
    Some(if usage_factor > 0.0 { 1.0 / usage_factor } else { f64::INFINITY })
}

/// `multi_node_sort`: same multi-key mechanism, over nodes instead of
/// jobs, reading each key's configured `ResourceField`.
pub fn multi_node_sort(keys: &[SortInfo], a: &NodeInfo, b: &NodeInfo) -> Ordering {
    for si in keys {
        let crate::sort::sort_info::SortKey::Resource(name) = &si.key else { continue };
        let va = find_node_amount(a, name, si.res_field);
        let vb = find_node_amount(b, name, si.res_field);
        let ord = va.partial_cmp(&vb).unwrap_or(Ordering::Equal);
        let ord = if si.direction == Direction::Desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.rank.cmp(&b.rank)
}

/// `cmp_queue_prio_dsc`: queues run in descending priority order, ties
/// broken by rank.
pub fn cmp_queue_prio_dsc(a_priority: i64, a_rank: Rank, b_priority: i64, b_rank: Rank) -> Ordering {
    b_priority.cmp(&a_priority).then(a_rank.cmp(&b_rank))
}

/// `cmp_starving_jobs`: jobs that have been eligible to run longest sort
/// first (ascending `eligible_time`), for starvation handling.
pub fn cmp_starving_jobs(a: &ResourceResv, b: &ResourceResv) -> Ordering {
    a.eligible_time.unwrap_or(i64::MAX).cmp(&b.eligible_time.unwrap_or(i64::MAX)).then(a.rank.cmp(&b.rank))
}

/// `cmp_preempt_priority_asc` + `cmp_preempt_stime_asc`: preemption
/// candidates sort by ascending preemption priority, ties broken by
/// ascending start time: the weakest, most-recently-started job first.
pub fn cmp_preemption_candidates(a: &ResourceResv, b: &ResourceResv) -> Ordering {
    a.preempt_priority.cmp(&b.preempt_priority).then_with(|| a.start.unwrap_or(i64::MAX).cmp(&b.start.unwrap_or(i64::MAX))).then(a.rank.cmp(&b.rank))
}
