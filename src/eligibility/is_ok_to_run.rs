use super::schd_error::{ErrorCode, SchdError, SchdErrorChain, StatusCode};
use crate::entity::{NSpecArray, PolicyState, QueueInfo, ResourceResv, ServerInfo};

/// Flags controlling `is_ok_to_run`'s error-accumulation behavior: short-
/// circuit at first failure unless `RETURN_ALL_ERR` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckFlags {
    pub return_all_err: bool,
}

/// Allocates nodes for a job/reservation once every prior check has
/// passed. Implemented by the bucket fast path and the
/// general path in `crate::selector`; injected here so the eligibility
/// checker doesn't need to depend on placement-set internals directly.
pub trait NodeAllocator {
    fn allocate(&self, sinfo: &ServerInfo, qinfo: &QueueInfo, resresv: &ResourceResv) -> Result<NSpecArray, SchdError>;
}

/// The ordered eligibility walk. Returns `Ok(nspecs)` on success, or
/// an error chain (one entry unless `flags.return_all_err`) plus the
/// allocation attempted, if any, otherwise `None`.
pub fn is_ok_to_run(
    policy: &PolicyState,
    sinfo: &ServerInfo,
    qinfo: &QueueInfo,
    resresv: &ResourceResv,
    allocator: &dyn NodeAllocator,
    flags: CheckFlags,
) -> Result<NSpecArray, SchdErrorChain> {
    let mut chain = SchdErrorChain::new();

    macro_rules! check {
        ($result:expr) => {
            if let Err(e) = $result {
                chain.push(e);
                if !flags.return_all_err {
                    return Err(chain);
                }
            }
        };
    }

    check!(check_queue_state(qinfo, policy));
    check!(check_ded_time_boundary(resresv, policy, qinfo));
    check!(check_prime_boundary(sinfo, resresv, policy));
    check!(check_hard_limits(sinfo, qinfo, resresv));
    check!(check_reservation_conflict(sinfo, resresv));
    check!(check_rassn_aggregate(sinfo, qinfo, resresv));

    if !chain.is_ok() {
        return Err(chain);
    }

    match allocator.allocate(sinfo, qinfo, resresv) {
        Ok(nspecs) => {
            check!(check_license_availability(sinfo, resresv));
            if chain.is_ok() {
                Ok(nspecs)
            } else {
                Err(chain)
            }
        }
        Err(e) => {
            chain.push(e);
            Err(chain)
        }
    }
}

/// Step 1: the queue must be enabled and started, and must accept this
/// job's prime/nonprime/dedicated classification.
fn check_queue_state(qinfo: &QueueInfo, policy: &PolicyState) -> Result<(), SchdError> {
    if !qinfo.started {
        return Err(SchdError::new(ErrorCode::QueueNotStarted, StatusCode::NotRun, "queue is not started"));
    }
    if !qinfo.enabled {
        return Err(SchdError::new(ErrorCode::QueueDisabled, StatusCode::NotRun, "queue is disabled"));
    }
    if qinfo.flags.is_dedicated && !policy.is_ded_time {
        return Err(SchdError::new(ErrorCode::DedTime, StatusCode::NotRun, "dedicated queue runs only during dedicated time"));
    }
    if qinfo.flags.is_prime_only && !policy.is_prime_time {
        return Err(SchdError::new(ErrorCode::PrimeBoundary, StatusCode::NotRun, "prime-only queue outside prime time"));
    }
    if qinfo.flags.is_nonprime_only && policy.is_prime_time {
        return Err(SchdError::new(ErrorCode::PrimeBoundary, StatusCode::NotRun, "nonprime-only queue during prime time"));
    }
    Ok(())
}

/// Step 2: a job already running must not cross into dedicated time, and
/// a job that starts during dedicated time must be in a dedicated queue.
fn check_ded_time_boundary(resresv: &ResourceResv, policy: &PolicyState, qinfo: &QueueInfo) -> Result<(), SchdError> {
    if policy.is_ded_time && !qinfo.flags.is_dedicated {
        return Err(SchdError::new(ErrorCode::CrossDedTimeBoundary, StatusCode::NotRun, "non-dedicated job during dedicated time"));
    }
    let _ = resresv;
    Ok(())
}

/// Step 3: the job's walltime must fit before the next prime<->nonprime
/// transition. `prime_spill` extends the deadline, but only when
/// `backfill_prime` is set; otherwise any overrun fails outright.
fn check_prime_boundary(sinfo: &ServerInfo, resresv: &ResourceResv, policy: &PolicyState) -> Result<(), SchdError> {
    let Some(transition) = policy.next_prime_transition else { return Ok(()) };
    let start = resresv.start.unwrap_or(sinfo.server_time);

    let mut deadline = transition;
    if policy.backfill_prime {
        if let Some(spill) = policy.prime_spill {
            deadline += spill;
        }
    }

    if start + resresv.duration > deadline {
        return Err(SchdError::new(ErrorCode::PrimeBoundary, StatusCode::NotRun, "walltime crosses the next prime/nonprime boundary"));
    }
    Ok(())
}

/// Step 4: server/queue hard limits on running-job counts.
fn check_hard_limits(sinfo: &ServerInfo, qinfo: &QueueInfo, resresv: &ResourceResv) -> Result<(), SchdError> {
    if let Some(max_running) = qinfo.limits.max_running {
        let running_in_queue = sinfo.running_jobs().filter(|j| j.queue == Some(qinfo.id)).count() as u32;
        if running_in_queue >= max_running {
            return Err(SchdError::new(ErrorCode::QueueUserLimitReached, StatusCode::NotRun, "queue max_running reached"));
        }
    }
    if let Some(&max_user) = qinfo.limits.max_user.get(&resresv.owner) {
        let running_for_user = sinfo.running_jobs().filter(|j| j.queue == Some(qinfo.id) && j.owner == resresv.owner).count() as u32;
        if running_for_user >= max_user {
            return Err(SchdError::new(ErrorCode::ServerUserLimitReached, StatusCode::NotRun, "per-user limit reached").with_resource(&resresv.owner));
        }
    }
    Ok(())
}

/// Step 5: a job asking for specific nodes must not collide with a
/// confirmed reservation's claim on those nodes during its window.
fn check_reservation_conflict(sinfo: &ServerInfo, resresv: &ResourceResv) -> Result<(), SchdError> {
    let Some(job_start) = resresv.start else { return Ok(()) };
    let job_end = job_start + resresv.duration;

    for resv in sinfo.confirmed_reservations() {
        let (Some(rstart), Some(rend)) = (resv.start, resv.end) else { continue };
        if job_start >= rend || job_end <= rstart {
            continue;
        }
        let resv_nodes: std::collections::HashSet<_> = resv.allocated.iter().map(|n| n.node).collect();
        if resresv.allocated.iter().any(|n| resv_nodes.contains(&n.node)) {
            return Err(SchdError::new(ErrorCode::ReservationConflict, StatusCode::NotRun, "node claimed by a reservation in this window"));
        }
    }
    Ok(())
}

/// Step 6: the sum of this job's `select` chunks for `rassn` resources
/// must not exceed what remains available.
fn check_rassn_aggregate(sinfo: &ServerInfo, qinfo: &QueueInfo, resresv: &ResourceResv) -> Result<(), SchdError> {
    let _ = qinfo;
    for entry in resresv.resreq.iter() {
        if !entry.def.flags.rassn {
            continue;
        }
        let Some(unused) = sinfo.server_resources.unused(&entry.def.name) else { continue };
        let requested = match &entry.available {
            crate::resource::Availability::Direct(v) => v.clone(),
            crate::resource::Availability::Indirect(_) => continue,
        };
        if matches!(unused.compare(&requested), crate::resource::CompareResult::Lt) {
            return Err(SchdError::new(ErrorCode::InsufficientResource, StatusCode::NotRun, "rassn aggregate exceeds availability")
                .with_resource(&entry.def.name));
        }
    }
    Ok(())
}

/// Step 8: license availability, modeled as a consumable server resource
/// named `license` (a deployment may map several license pools to distinct
/// `ResourceDef`s; this checks whichever ones the job actually requested).
fn check_license_availability(sinfo: &ServerInfo, resresv: &ResourceResv) -> Result<(), SchdError> {
    for entry in resresv.resreq.iter() {
        if entry.def.name != "license" {
            continue;
        }
        let Some(unused) = sinfo.server_resources.unused("license") else { continue };
        let requested = match &entry.available {
            crate::resource::Availability::Direct(v) => v.clone(),
            crate::resource::Availability::Indirect(_) => continue,
        };
        if matches!(unused.compare(&requested), crate::resource::CompareResult::Lt) {
            return Err(SchdError::new(ErrorCode::InsufficientResource, StatusCode::NotRun, "insufficient licenses").with_resource("license"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{JobState, PlaceSpec, PrevJobInfo, QueueId, ResvId, ResvKind, ShareType, State};
    use crate::resource::ResourceList;
    use slotmap::SlotMap;

    struct AlwaysAllocate;
    impl NodeAllocator for AlwaysAllocate {
        fn allocate(&self, _sinfo: &ServerInfo, _qinfo: &QueueInfo, _resresv: &ResourceResv) -> Result<NSpecArray, SchdError> {
            Ok(Vec::new())
        }
    }

    fn make_job(owner: &str, queue: Option<QueueId>) -> ResourceResv {
        let mut m: SlotMap<ResvId, ()> = SlotMap::with_key();
        let id = m.insert(());
        ResourceResv {
            id,
            rank: crate::entity::Rank(1),
            name: "job1".into(),
            owner: owner.into(),
            queue,
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
    fn disabled_queue_fails_immediately_without_return_all_err() {
        let mut sinfo = ServerInfo::new(0);
        let qid = sinfo.add_queue(|id| {
            let mut q = QueueInfo::new(id, crate::entity::Rank(1), "workq", crate::entity::QueueType::Execution);
            q.enabled = false;
            q
        });
        let qinfo = sinfo.queue(qid).unwrap().clone();
        let policy = PolicyState::default();
        let job = make_job("alice", Some(qid));

        let result = is_ok_to_run(&policy, &sinfo, &qinfo, &job, &AlwaysAllocate, CheckFlags::default());
        let chain = result.unwrap_err();
        assert_eq!(chain.errors.len(), 1);
        assert_eq!(chain.errors[0].code, ErrorCode::QueueDisabled);
    }

    #[test]
    fn return_all_err_accumulates_every_failed_check() {
        let mut sinfo = ServerInfo::new(0);
        let qid = sinfo.add_queue(|id| {
            let mut q = QueueInfo::new(id, crate::entity::Rank(1), "workq", crate::entity::QueueType::Execution);
            q.enabled = false;
            q.started = false;
            q
        });
        let qinfo = sinfo.queue(qid).unwrap().clone();
        let policy = PolicyState::default();
        let job = make_job("alice", Some(qid));

        let result = is_ok_to_run(&policy, &sinfo, &qinfo, &job, &AlwaysAllocate, CheckFlags { return_all_err: true });
        let chain = result.unwrap_err();
        assert!(chain.errors.len() >= 2);
    }

    #[test]
    fn a_fully_eligible_job_succeeds() {
        let mut sinfo = ServerInfo::new(0);
        let qid = sinfo.add_queue(|id| QueueInfo::new(id, crate::entity::Rank(1), "workq", crate::entity::QueueType::Execution));
        let qinfo = sinfo.queue(qid).unwrap().clone();
        let policy = PolicyState::default();
        let job = make_job("alice", Some(qid));

        let result = is_ok_to_run(&policy, &sinfo, &qinfo, &job, &AlwaysAllocate, CheckFlags::default());
        assert!(result.is_ok());
    }

    #[test]
    fn walltime_crossing_the_prime_boundary_is_rejected() {
        let mut sinfo = ServerInfo::new(0);
        let qid = sinfo.add_queue(|id| QueueInfo::new(id, crate::entity::Rank(1), "workq", crate::entity::QueueType::Execution));
        let qinfo = sinfo.queue(qid).unwrap().clone();
        let policy = PolicyState { next_prime_transition: Some(100), ..Default::default() };
        let mut job = make_job("alice", Some(qid));
        job.start = Some(0);
        job.duration = 200;

        let result = is_ok_to_run(&policy, &sinfo, &qinfo, &job, &AlwaysAllocate, CheckFlags::default());
        let chain = result.unwrap_err();
        assert_eq!(chain.errors[0].code, ErrorCode::PrimeBoundary);
    }

    #[test]
    fn prime_spill_extends_the_deadline_only_under_backfill_prime() {
        let mut sinfo = ServerInfo::new(0);
        let qid = sinfo.add_queue(|id| QueueInfo::new(id, crate::entity::Rank(1), "workq", crate::entity::QueueType::Execution));
        let qinfo = sinfo.queue(qid).unwrap().clone();
        let mut job = make_job("alice", Some(qid));
        job.start = Some(0);
        job.duration = 150;

        let no_backfill = PolicyState { next_prime_transition: Some(100), prime_spill: Some(100), backfill_prime: false, ..Default::default() };
        assert!(is_ok_to_run(&no_backfill, &sinfo, &qinfo, &job, &AlwaysAllocate, CheckFlags::default()).is_err());

        let with_backfill = PolicyState { next_prime_transition: Some(100), prime_spill: Some(100), backfill_prime: true, ..Default::default() };
        assert!(is_ok_to_run(&with_backfill, &sinfo, &qinfo, &job, &AlwaysAllocate, CheckFlags::default()).is_ok());
    }
}
