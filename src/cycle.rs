//! Top-level cycle driver: wires sorting, eligibility, node selection,
//! calendar simulation, backfill, preemption and fairshare accounting
//! together into the one control flow the rest of the crate exists to run.

use crate::backfill::{admit_for_backfill, BackfillPolicy, BackfillQuotas};
use crate::calendar::{calc_run_time, create_event_list, EventList};
use crate::context::SchedulerContext;
use crate::eligibility::{is_ok_to_run, CheckFlags, NodeAllocator, SchdErrorChain};
use crate::entity::{NSpecArray, PolicyState, QueueId, ResvId, ServerInfo};
use crate::preempt::select_preemption_targets;
use crate::selector::{BucketSelector, GeneralSelector};
use crate::sort::{multi_sort_jobs, SortInfo};

/// One decision the cycle driver made for a single candidate job.
#[derive(Debug, Clone)]
pub enum RunAction {
    /// The job was started now, with this allocation.
    Run { job: ResvId, nspecs: NSpecArray },
    /// The job was calendared as a top job for a simulated future start.
    Calendared { job: ResvId, start: i64 },
    /// Running jobs were chosen for preemption to unblock `job`.
    Preempted { job: ResvId, targets: Vec<crate::preempt::PreemptAction> },
    /// The job could not run now or be calendared; `chain` explains why.
    Blocked { job: ResvId, chain: SchdErrorChain },
}

/// Everything the cycle needs beyond `ServerInfo` itself: sort order,
/// backfill/preemption policy, and the flags `is_ok_to_run` should apply.
pub struct CycleConfig {
    pub sort_keys: Vec<SortInfo>,
    pub fair_share: bool,
    pub backfill: bool,
    pub backfill_policy: BackfillPolicy,
    pub preemptive_sched: bool,
    pub preempt_methods: Vec<crate::preempt::PreemptMethod>,
    pub check_flags: CheckFlags,
    pub dedtime_windows: Vec<(i64, i64)>,
    pub fairshare_usage_amount: u64,
}

impl CycleConfig {
    /// Builds a `CycleConfig` from a loaded `sched_config`. The cycle
    /// driver never reads `SchedConfig` fields directly, only through this
    /// translation.
    pub fn from_config(cfg: &crate::config::SchedConfig) -> Self {
        let mut sort_keys = Vec::new();
        if cfg.fair_share {
            sort_keys.push(SortInfo::new(crate::sort::sort_info::SortKey::FairSharePerc, crate::sort::sort_info::Direction::Desc));
        }
        sort_keys.push(SortInfo::new(crate::sort::sort_info::SortKey::JobPriority, crate::sort::sort_info::Direction::Desc));
        sort_keys.push(SortInfo::new(crate::sort::sort_info::SortKey::EligibleTime, crate::sort::sort_info::Direction::Asc));

        let preempt_methods: Vec<_> = cfg.preempt_order.iter().filter_map(|&c| crate::preempt::PreemptMethod::from_code(c)).collect();
        let dedtime_windows = Vec::new();

        CycleConfig {
            sort_keys,
            fair_share: cfg.fair_share,
            backfill: cfg.backfill,
            backfill_policy: BackfillPolicy { backfill_depth: cfg.per_queues_topjobs.max(cfg.per_share_topjobs).max(1) },
            preemptive_sched: cfg.preemptive_sched,
            preempt_methods,
            check_flags: CheckFlags::default(),
            dedtime_windows,
            fairshare_usage_amount: 1,
        }
    }
}

/// Picks the node allocator appropriate for one candidate: the bucket fast
/// path when it applies, the general path otherwise.
fn allocator_for<'a>(bucket: &'a BucketSelector, general: &'a GeneralSelector, resresv: &crate::entity::ResourceResv) -> &'a dyn NodeAllocator {
    if BucketSelector::applies(resresv) {
        bucket
    } else {
        general
    }
}

/// Runs exactly one scheduling cycle over `sinfo`: build the calendar from
/// running jobs and confirmed reservations, sort
/// candidates, and for each try to run now, calendar via backfill, or
/// preempt, recording the outcome. Mutates `sinfo` and `ctx.fairshare` for
/// every job actually started.
pub fn run_cycle(ctx: &mut SchedulerContext, sinfo: &mut ServerInfo, cfg: &CycleConfig) -> Vec<RunAction> {
    let mut actions = Vec::new();
    let mut policy = sinfo.policy_state;
    policy.backfill_prime = ctx.config.backfill_prime;
    policy.prime_spill = ctx.config.prime_spill.map(|d| d.as_secs() as i64);
    if let Some(holidays) = &ctx.holidays {
        policy.is_prime_time = holidays.is_prime_time(sinfo.server_time);
        policy.next_prime_transition = holidays.next_transition(sinfo.server_time);
    } else {
        policy.next_prime_transition = None;
    }
    let mut calendar = create_event_list(sinfo, &cfg.dedtime_windows);
    let mut quotas = BackfillQuotas::default();

    let bucket_selector = BucketSelector;
    let general_selector = GeneralSelector;

    ctx.fairshare.reset_temp_usage();

    let mut candidate_ids: Vec<ResvId> = sinfo.queued_jobs().map(|j| j.id).collect();
    candidate_ids.sort_by(|&a, &b| {
        let ja = sinfo.resv(a).unwrap();
        let jb = sinfo.resv(b).unwrap();
        multi_sort_jobs(&cfg.sort_keys, ja, jb, cfg.fair_share.then_some(&ctx.fairshare))
    });

    for job_id in candidate_ids {
        let action = schedule_one(ctx, sinfo, &mut policy, &mut calendar, &mut quotas, cfg, &bucket_selector, &general_selector, job_id);
        actions.push(action);
    }

    sinfo.policy_state = policy;
    actions
}

#[allow(clippy::too_many_arguments)]
fn schedule_one(
    ctx: &mut SchedulerContext,
    sinfo: &mut ServerInfo,
    policy: &mut PolicyState,
    calendar: &mut EventList,
    quotas: &mut BackfillQuotas,
    cfg: &CycleConfig,
    bucket_selector: &BucketSelector,
    general_selector: &GeneralSelector,
    job_id: ResvId,
) -> RunAction {
    let Some(queue_id) = sinfo.resv(job_id).and_then(|j| j.queue) else {
        return RunAction::Blocked { job: job_id, chain: SchdErrorChain::new() };
    };
    let qinfo = sinfo.queue(queue_id).cloned();
    let Some(qinfo) = qinfo else {
        return RunAction::Blocked { job: job_id, chain: SchdErrorChain::new() };
    };

    let job = sinfo.resv(job_id).unwrap().clone();
    let allocator = allocator_for(bucket_selector, general_selector, &job);

    match is_ok_to_run(policy, sinfo, &qinfo, &job, allocator, cfg.check_flags) {
        Ok(nspecs) => {
            commit_run(ctx, sinfo, &job, &nspecs, cfg);
            RunAction::Run { job: job_id, nspecs }
        }
        Err(chain) => {
            if cfg.preemptive_sched {
                if let Some(targets) = select_preemption_targets(sinfo, &job, &cfg.preempt_methods) {
                    for t in &targets {
                        if let Some(r) = sinfo.resv_mut(t.job) {
                            r.state = crate::entity::State::Job(crate::entity::JobState::Exiting);
                        }
                    }
                    return RunAction::Preempted { job: job_id, targets };
                }
            }

            if cfg.backfill {
                let queue_quota = qinfo.topjobs_quota;
                let admitted = admit_for_backfill(&chain, &job, &qinfo.name, queue_quota, Some(ctx.config.per_share_topjobs), Some(&ctx.fairshare), &cfg.backfill_policy, quotas);
                if admitted {
                    let allocator = allocator_for(bucket_selector, general_selector, &job);
                    if let Some((start, _nspecs)) = calc_run_time(policy, sinfo, calendar, &qinfo, &job, allocator) {
                        if let Some(r) = sinfo.resv_mut(job_id) {
                            r.start = Some(start);
                            r.is_topjob = true;
                        }
                        return RunAction::Calendared { job: job_id, start };
                    }
                }
            }

            RunAction::Blocked { job: job_id, chain }
        }
    }
}

fn commit_run(ctx: &mut SchedulerContext, sinfo: &mut ServerInfo, job: &crate::entity::ResourceResv, nspecs: &NSpecArray, cfg: &CycleConfig) {
    if let Some(r) = sinfo.resv_mut(job.id) {
        r.state = crate::entity::State::Job(crate::entity::JobState::Running);
        r.start = Some(sinfo.server_time);
        r.end = Some(sinfo.server_time + r.duration);
        r.allocated = nspecs.clone();
    }
    for n in nspecs {
        if let Some(node) = sinfo.node_mut(n.node) {
            for (name, amount) in n.resources_used.iter().map(|e| (e.def.name.clone(), e.assigned.clone())) {
                if let Some(entry) = node.resources.get_mut(&name) {
                    entry.assigned = entry.assigned.add(&amount).unwrap_or_else(|_| entry.assigned.clone());
                }
            }
        }
    }
    sinfo.refresh_state_count();

    if let Some(entity) = job.fair_share_entity.as_deref() {
        ctx.fairshare.update_usage_on_run(entity, cfg.fairshare_usage_amount);
    }
}
