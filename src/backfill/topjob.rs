use crate::eligibility::{ErrorCode, SchdErrorChain};
use crate::entity::ResourceResv;
use crate::fairshare::FairshareTree;

/// Rejection classes that mean a job can never fit no matter how far the
/// calendar is simulated forward; backfill admission is skipped entirely
/// for these.
fn is_permanently_ineligible(chain: &SchdErrorChain) -> bool {
    chain.errors.iter().any(|e| {
        matches!(
            e.code,
            ErrorCode::DedTime
                | ErrorCode::CrossDedTimeBoundary
                | ErrorCode::ServerUserLimitReached
                | ErrorCode::QueueUserLimitReached
                | ErrorCode::GroupCpuInsufficient
        )
    })
}

/// Per-cycle counters tracking how many jobs have already been admitted
/// into each backfill quota, consulted in order.
#[derive(Debug, Clone, Default)]
pub struct BackfillQuotas {
    pub per_queue_topjobs: std::collections::HashMap<String, u32>,
    pub per_share_topjobs: std::collections::HashMap<String, u32>,
    pub global_admitted: u32,
}

/// Static policy limits a cycle reads from config.
#[derive(Debug, Clone, Copy)]
pub struct BackfillPolicy {
    pub backfill_depth: u32,
}

/// Decides whether a job that just failed `is_ok_to_run` should be
/// admitted as a calendared top job. Quotas are consulted in order; the
/// first one with room admits the job and is charged.
pub fn admit_for_backfill(
    chain: &SchdErrorChain,
    job: &ResourceResv,
    queue_name: &str,
    queue_quota: Option<u32>,
    share_quota: Option<u32>,
    fairshare: Option<&FairshareTree>,
    policy: &BackfillPolicy,
    quotas: &mut BackfillQuotas,
) -> bool {
    if is_permanently_ineligible(chain) {
        return false;
    }

    if let Some(quota) = queue_quota {
        let used = quotas.per_queue_topjobs.entry(queue_name.to_string()).or_insert(0);
        if *used < quota {
            *used += 1;
            return true;
        }
    }

    if let (Some(quota), Some(name)) = (share_quota, job.fair_share_entity.as_deref()) {
        let used = quotas.per_share_topjobs.entry(name.to_string()).or_insert(0);
        if *used < quota {
            *used += 1;
            return true;
        }
    }

    if let Some(fairshare) = fairshare {
        if let Some(name) = job.fair_share_entity.as_deref() {
            if let Some(id) = fairshare.find(name) {
                let node = &fairshare.nodes[id];
                let ratio = if node.tree_percentage > 0.0 { node.temp_usage as f64 / node.tree_percentage / fairshare.nodes[fairshare.root].temp_usage.max(1) as f64 } else { 0.0 };
                if ratio < 1.0 {
                    return true;
                }
            }
        }
    }

    if quotas.global_admitted < policy.backfill_depth {
        quotas.global_admitted += 1;
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::{SchdError, StatusCode};
    use crate::entity::{JobState, PlaceSpec, PrevJobInfo, ResvId, ResvKind, ShareType, State};
    use crate::resource::ResourceList;
    use slotmap::SlotMap;

    fn job() -> ResourceResv {
        let mut m: SlotMap<ResvId, ()> = SlotMap::with_key();
        let id = m.insert(());
        ResourceResv {
            id,
            rank: crate::entity::Rank(1),
            name: "j".into(),
            owner: "a".into(),
            queue: None,
            kind: ResvKind::Job,
            resreq: ResourceList::new(),
            select: Vec::new(),
            place: PlaceSpec::default(),
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

    #[test]
    fn permanently_ineligible_jobs_never_backfill() {
        let mut chain = SchdErrorChain::new();
        chain.push(SchdError::new(ErrorCode::DedTime, StatusCode::NeverRun, "x"));
        let mut quotas = BackfillQuotas::default();
        let admitted = admit_for_backfill(&chain, &job(), "workq", Some(5), None, None, &BackfillPolicy { backfill_depth: 10 }, &mut quotas);
        assert!(!admitted);
    }

    #[test]
    fn per_queue_quota_admits_until_exhausted() {
        let chain = SchdErrorChain::new();
        let mut quotas = BackfillQuotas::default();
        let policy = BackfillPolicy { backfill_depth: 0 };
        assert!(admit_for_backfill(&chain, &job(), "workq", Some(1), None, None, &policy, &mut quotas));
        assert!(!admit_for_backfill(&chain, &job(), "workq", Some(1), None, None, &policy, &mut quotas));
    }

    #[test]
    fn global_backfill_depth_is_the_last_resort_quota() {
        let chain = SchdErrorChain::new();
        let mut quotas = BackfillQuotas::default();
        let policy = BackfillPolicy { backfill_depth: 1 };
        assert!(admit_for_backfill(&chain, &job(), "workq", None, None, None, &policy, &mut quotas));
        assert!(!admit_for_backfill(&chain, &job(), "workq", None, None, None, &policy, &mut quotas));
    }
}
