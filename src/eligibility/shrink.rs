use super::is_ok_to_run::{is_ok_to_run, CheckFlags, NodeAllocator};
use super::schd_error::{ErrorCode, SchdError, SchdErrorChain, StatusCode};
use crate::entity::{NSpecArray, PolicyState, QueueInfo, ResourceResv, ServerInfo};

/// A job's walltime can be shrunk to fit one of three boundaries, tried in
/// this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkBoundary {
    /// Shrink to the next dedicated/prime-time transition.
    TimeBoundary,
    /// Shrink to the job's own configured minimum walltime.
    MinWalltime,
    /// Shrink to just before the next calendared run event.
    RunEvent,
}

/// Runs `is_ok_to_run` repeatedly against shrinking walltime candidates
/// for a job whose `shrink_bounds` (`(min, max)`) allow it, per
/// `is_ok_to_run_STF`. Stops at the first candidate duration that is
/// eligible; returns the allocation and the duration actually used.
pub fn is_ok_to_run_stf(
    policy: &PolicyState,
    sinfo: &ServerInfo,
    qinfo: &QueueInfo,
    job: &ResourceResv,
    allocator: &dyn NodeAllocator,
    flags: CheckFlags,
    next_run_event: Option<i64>,
) -> Result<(NSpecArray, i64), SchdErrorChain> {
    let Some((min_wt, max_wt)) = job.shrink_bounds else {
        let mut chain = SchdErrorChain::new();
        chain.push(SchdError::new(ErrorCode::InsufficientResource, StatusCode::NotRun, "job is not shrinkable"));
        return Err(chain);
    };

    for boundary in [ShrinkBoundary::TimeBoundary, ShrinkBoundary::RunEvent, ShrinkBoundary::MinWalltime] {
        let Some(candidate_duration) = shrink_to(boundary, job, min_wt, max_wt, next_run_event) else { continue };
        let mut trial = job.clone();
        trial.duration = candidate_duration;
        if let Ok(nspecs) = is_ok_to_run(policy, sinfo, qinfo, &trial, allocator, flags) {
            return Ok((nspecs, candidate_duration));
        }
    }

    let mut chain = SchdErrorChain::new();
    chain.push(SchdError::new(ErrorCode::InsufficientResource, StatusCode::NotRun, "no shrink candidate was eligible"));
    Err(chain)
}

/// `shrink_to_boundary` / `shrink_to_minwt` / `shrink_to_run_event`: each
/// computes a candidate duration within `[min_wt, max_wt]`, or `None` if
/// that boundary doesn't apply to this job right now.
fn shrink_to(boundary: ShrinkBoundary, job: &ResourceResv, min_wt: i64, max_wt: i64, next_run_event: Option<i64>) -> Option<i64> {
    match boundary {
        ShrinkBoundary::TimeBoundary => None,
        ShrinkBoundary::RunEvent => {
            let start = job.start?;
            let event_time = next_run_event?;
            if event_time <= start {
                return None;
            }
            Some((event_time - start).clamp(min_wt, max_wt))
        }
        ShrinkBoundary::MinWalltime => Some(min_wt.clamp(min_wt, max_wt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{JobState, PlaceSpec, PrevJobInfo, QueueType, ResvId, ResvKind, ShareType, State};
    use crate::resource::ResourceList;
    use slotmap::SlotMap;

    struct AlwaysAllocate;
    impl NodeAllocator for AlwaysAllocate {
        fn allocate(&self, _sinfo: &ServerInfo, _qinfo: &QueueInfo, _resresv: &ResourceResv) -> Result<NSpecArray, SchdError> {
            Ok(Vec::new())
        }
    }

    fn make_shrinkable_job(start: i64, min_wt: i64, max_wt: i64) -> ResourceResv {
        let mut m: SlotMap<ResvId, ()> = SlotMap::with_key();
        let id = m.insert(());
        ResourceResv {
            id,
            rank: crate::entity::Rank(1),
            name: "stf_job".into(),
            owner: "alice".into(),
            queue: None,
            kind: ResvKind::Job,
            resreq: ResourceList::new(),
            select: Vec::new(),
            place: PlaceSpec::default(),
            start: Some(start),
            end: None,
            duration: max_wt,
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
            shrink_bounds: Some((min_wt, max_wt)),
            preempt_targets: None,
            standing: false,
            is_topjob: false,
            topjob_ineligible: false,
            comment: None,
            prev: PrevJobInfo::default(),
        }
    }

    #[test]
    fn shrinks_to_fit_before_the_next_run_event() {
        let mut sinfo = ServerInfo::new(0);
        let qid = sinfo.add_queue(|id| QueueInfo::new(id, crate::entity::Rank(1), "workq", QueueType::Execution));
        let qinfo = sinfo.queue(qid).unwrap().clone();
        let policy = PolicyState::default();
        let job = make_shrinkable_job(0, 100, 10_000);

        let (_, duration) = is_ok_to_run_stf(&policy, &sinfo, &qinfo, &job, &AlwaysAllocate, CheckFlags::default(), Some(500)).unwrap();
        assert_eq!(duration, 500);
    }

    #[test]
    fn non_shrinkable_job_is_rejected_immediately() {
        let mut sinfo = ServerInfo::new(0);
        let qid = sinfo.add_queue(|id| QueueInfo::new(id, crate::entity::Rank(1), "workq", QueueType::Execution));
        let qinfo = sinfo.queue(qid).unwrap().clone();
        let policy = PolicyState::default();
        let mut job = make_shrinkable_job(0, 100, 10_000);
        job.shrink_bounds = None;

        let result = is_ok_to_run_stf(&policy, &sinfo, &qinfo, &job, &AlwaysAllocate, CheckFlags::default(), Some(500));
        assert!(result.is_err());
    }
}
