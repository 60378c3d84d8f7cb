//! End-to-end scenarios driving a full `run_cycle` against hand-built
//! snapshots, one test per scenario family: simple placement, backfill
//! around a reservation, top-job calendaring, scatter placement, fairshare
//! ordering, and preemption.

use sched_core::context::SchedulerContext;
use sched_core::cycle::{run_cycle, CycleConfig, RunAction};
use sched_core::entity::{
    Chunk, JobState, NodeInfo, PlaceSpec, PrevJobInfo, QueueInfo, QueueType, Rank, RankAllocator, ResourceResv, ResvId, ResvKind, ServerInfo,
    ShareType, State,
};
use sched_core::resource::{ResourceDefRegistry, ResourceEntry, ResourceList, ResourceValue};
use sched_core::selector::{parse_place, parse_select};

fn node(sinfo: &mut ServerInfo, ranks: &RankAllocator, reg: &ResourceDefRegistry, name: &str, ncpus: i64) -> sched_core::entity::NodeId {
    let mut resources = ResourceList::new();
    resources.insert(ResourceEntry::new(reg.get("ncpus").unwrap(), ResourceValue::Long(ncpus)));
    sinfo.add_node(|id| NodeInfo::new(id, ranks.alloc(), name, name, resources))
}

#[allow(clippy::too_many_arguments)]
fn queued_job(
    sinfo: &mut ServerInfo,
    ranks: &RankAllocator,
    queue: sched_core::entity::QueueId,
    reg: &mut ResourceDefRegistry,
    name: &str,
    owner: &str,
    select: &str,
    place: &str,
    duration: i64,
    job_priority: i64,
) -> ResvId {
    let chunks = parse_select(select, reg).unwrap();
    let place = parse_place(place).unwrap();
    sinfo.add_resv(|id| blank_job(id, ranks.alloc(), name, owner, Some(queue), chunks, place, duration, job_priority))
}

#[allow(clippy::too_many_arguments)]
fn blank_job(
    id: ResvId,
    rank: Rank,
    name: &str,
    owner: &str,
    queue: Option<sched_core::entity::QueueId>,
    select: Vec<Chunk>,
    place: PlaceSpec,
    duration: i64,
    job_priority: i64,
) -> ResourceResv {
    ResourceResv {
        id,
        rank,
        name: name.into(),
        owner: owner.into(),
        queue,
        kind: ResvKind::Job,
        resreq: ResourceList::new(),
        select,
        place,
        start: None,
        end: None,
        duration,
        state: State::Job(JobState::Queued),
        run_event: None,
        end_event: None,
        allocated: Vec::new(),
        share_group_leader: None,
        share_type: ShareType::Ignore,
        preempt_priority: 0,
        job_priority,
        eligible_time: Some(0),
        fair_share_entity: Some(owner.to_string()),
        shrink_bounds: None,
        preempt_targets: None,
        standing: false,
        is_topjob: false,
        topjob_ineligible: false,
        comment: None,
        prev: PrevJobInfo::default(),
    }
}

fn default_cfg() -> CycleConfig {
    let mut cfg = CycleConfig::from_config(&sched_core::config::SchedConfig::default());
    cfg.backfill = true;
    cfg
}

/// S1: one node with spare capacity, one job that fits -- it runs this cycle.
#[test]
fn s1_simple_fit_runs_immediately() {
    let mut ctx = SchedulerContext::minimal();
    let ranks = RankAllocator::new();
    let mut sinfo = ServerInfo::new(0);
    node(&mut sinfo, &ranks, &ctx.resource_defs, "n1", 4);
    let q = sinfo.add_queue(|id| QueueInfo::new(id, ranks.alloc(), "workq", QueueType::Execution));
    let job = queued_job(&mut sinfo, &ranks, q, &mut ctx.resource_defs, "j1", "alice", "1:ncpus=2", "free", 600, 0);

    let cfg = default_cfg();
    let actions = run_cycle(&mut ctx, &mut sinfo, &cfg);

    assert_eq!(actions.len(), 1);
    match &actions[0] {
        RunAction::Run { job: j, nspecs } => {
            assert_eq!(*j, job);
            assert!(!nspecs.is_empty());
        }
        other => panic!("expected the job to run, got {other:?}"),
    }
    let resv = sinfo.resv(job).unwrap();
    assert!(resv.is_running());
    assert_eq!(resv.start, Some(0));
}

/// S2: a confirmed reservation claims both nodes starting in an hour. A
/// short job that fits and finishes well before the reservation's window
/// opens should still run now rather than wait.
#[test]
fn s2_short_job_runs_now_ahead_of_a_future_reservation() {
    let mut ctx = SchedulerContext::minimal();
    let ranks = RankAllocator::new();
    let mut sinfo = ServerInfo::new(0);
    node(&mut sinfo, &ranks, &ctx.resource_defs, "n1", 4);
    node(&mut sinfo, &ranks, &ctx.resource_defs, "n2", 4);
    let q = sinfo.add_queue(|id| QueueInfo::new(id, ranks.alloc(), "workq", QueueType::Execution));

    // A confirmed reservation starting at t=3600, ending at t=7200.
    sinfo.add_resv(|id| ResourceResv {
        start: Some(3600),
        end: Some(7200),
        duration: 3600,
        state: State::Resv(sched_core::entity::ResvState::Confirmed),
        kind: ResvKind::Reservation,
        ..blank_job(id, ranks.alloc(), "resv1", "bob", None, Vec::new(), PlaceSpec::default(), 3600, 0)
    });

    let job = queued_job(&mut sinfo, &ranks, q, &mut ctx.resource_defs, "j1", "alice", "1:ncpus=2", "free", 1800, 0);

    let cfg = default_cfg();
    let actions = run_cycle(&mut ctx, &mut sinfo, &cfg);

    assert!(matches!(&actions[0], RunAction::Run { job: j, .. } if *j == job));
    let resv = sinfo.resv(job).unwrap();
    assert_eq!(resv.end, Some(1800));
}

/// S3: both nodes are fully occupied by a running job that ends at t=600.
/// A higher-priority job that cannot fit now should be calendared (given
/// a start time via the simulator) rather than blocked outright.
#[test]
fn s3_top_job_is_calendared_past_a_running_jobs_end() {
    let mut ctx = SchedulerContext::minimal();
    let ranks = RankAllocator::new();
    let mut sinfo = ServerInfo::new(0);
    let n1 = node(&mut sinfo, &ranks, &ctx.resource_defs, "n1", 4);
    let n2 = node(&mut sinfo, &ranks, &ctx.resource_defs, "n2", 4);
    let q = sinfo.add_queue(|id| QueueInfo::new(id, ranks.alloc(), "workq", QueueType::Execution));

    // Running job X occupies every cpu on both nodes until t=600.
    let running_select = parse_select("2:ncpus=4", &mut ctx.resource_defs).unwrap();
    let running_id = sinfo.add_resv(|id| ResourceResv {
        start: Some(-600),
        end: Some(600),
        duration: 1200,
        state: State::Job(JobState::Running),
        allocated: vec![
            sched_core::entity::NSpec { node: n1, seq_num: 0, sub_seq_num: 0, end_of_chunk: true, resources_used: running_select[0].resources.clone() },
            sched_core::entity::NSpec { node: n2, seq_num: 0, sub_seq_num: 1, end_of_chunk: true, resources_used: running_select[0].resources.clone() },
        ],
        ..blank_job(id, ranks.alloc(), "running_x", "carol", Some(q), running_select, PlaceSpec::default(), 1200, 0)
    });
    for (n, amount) in [(n1, 4i64), (n2, 4i64)] {
        let entry = sinfo.node_mut(n).unwrap().resources.get_mut("ncpus").unwrap();
        entry.assigned = ResourceValue::Long(amount);
    }
    assert!(sinfo.resv(running_id).unwrap().is_running());

    // Queued job Y needs both nodes fully and has the higher priority.
    let job_y = queued_job(&mut sinfo, &ranks, q, &mut ctx.resource_defs, "y", "dave", "2:ncpus=4", "free", 600, 10);

    let cfg = default_cfg();
    let actions = run_cycle(&mut ctx, &mut sinfo, &cfg);

    let action = actions.iter().find(|a| matches!(a, RunAction::Calendared { job, .. } if *job == job_y));
    let Some(RunAction::Calendared { start, .. }) = action else {
        panic!("expected job y to be calendared as a top job, got {actions:?}");
    };
    assert_eq!(*start, 600, "job y should be calendared to start exactly when job x ends");
    assert!(sinfo.resv(job_y).unwrap().is_topjob);
}

/// S4: a scatter job's chunks must land on distinct nodes even though one
/// node alone has enough capacity to host all of them.
#[test]
fn s4_scatter_placement_spreads_chunks_across_nodes() {
    let mut ctx = SchedulerContext::minimal();
    let ranks = RankAllocator::new();
    let mut sinfo = ServerInfo::new(0);
    node(&mut sinfo, &ranks, &ctx.resource_defs, "n1", 8);
    node(&mut sinfo, &ranks, &ctx.resource_defs, "n2", 8);
    let q = sinfo.add_queue(|id| QueueInfo::new(id, ranks.alloc(), "workq", QueueType::Execution));
    let job = queued_job(&mut sinfo, &ranks, q, &mut ctx.resource_defs, "scatter_job", "erin", "2:ncpus=2", "scatter", 600, 0);

    let cfg = default_cfg();
    let actions = run_cycle(&mut ctx, &mut sinfo, &cfg);

    let RunAction::Run { nspecs, .. } = &actions[0] else { panic!("expected the scatter job to run, got {actions:?}") };
    let used: std::collections::HashSet<_> = nspecs.iter().map(|n| n.node).collect();
    assert_eq!(used.len(), 2, "scatter must not pack both chunks onto one node");
    assert!(sinfo.resv(job).unwrap().is_running());
}

/// S5: two equally-sized queued jobs competing for one slot; the job
/// belonging to the entity with the lower fairshare usage (and so the
/// higher fairshare percentage) should be preferred.
#[test]
fn s5_fairshare_prefers_the_less_advantaged_entity() {
    let mut ctx = SchedulerContext::minimal();
    ctx.fairshare.add_child("heavy_user", None, 1);
    ctx.fairshare.add_child("light_user", None, 1);
    ctx.fairshare.calc_fair_share_perc();
    ctx.fairshare.update_usage_on_run("heavy_user", 1000);
    ctx.fairshare.update_usage_on_run("light_user", 100);
    ctx.fairshare.calc_usage_factor();

    let ranks = RankAllocator::new();
    let mut sinfo = ServerInfo::new(0);
    node(&mut sinfo, &ranks, &ctx.resource_defs, "n1", 2);
    let q = sinfo.add_queue(|id| QueueInfo::new(id, ranks.alloc(), "workq", QueueType::Execution));

    let heavy = queued_job(&mut sinfo, &ranks, q, &mut ctx.resource_defs, "heavy_job", "heavy_user", "1:ncpus=2", "free", 600, 0);
    let light = queued_job(&mut sinfo, &ranks, q, &mut ctx.resource_defs, "light_job", "light_user", "1:ncpus=2", "free", 600, 0);

    let mut cfg = default_cfg();
    cfg.fair_share = true;
    cfg.sort_keys = vec![sched_core::sort::SortInfo::new(
        sched_core::sort::sort_info::SortKey::FairSharePerc,
        sched_core::sort::sort_info::Direction::Desc,
    )];

    let actions = run_cycle(&mut ctx, &mut sinfo, &cfg);

    assert!(matches!(&actions[0], RunAction::Run { job, .. } if *job == light), "the less-advantaged entity's job should run first");
    assert!(matches!(&actions[1], RunAction::Blocked { job, .. } if *job == heavy));
}

/// S6: a node is fully claimed by a low-priority running job. A
/// higher-class job that cannot fit triggers preemption of the running job.
#[test]
fn s6_preemption_frees_a_node_for_a_higher_class_job() {
    let mut ctx = SchedulerContext::minimal();
    let ranks = RankAllocator::new();
    let mut sinfo = ServerInfo::new(0);
    let n1 = node(&mut sinfo, &ranks, &ctx.resource_defs, "n1", 4);
    let q = sinfo.add_queue(|id| QueueInfo::new(id, ranks.alloc(), "workq", QueueType::Execution));

    let low_select = parse_select("1:ncpus=4", &mut ctx.resource_defs).unwrap();
    let low_job = sinfo.add_resv(|id| ResourceResv {
        start: Some(-100),
        state: State::Job(JobState::Running),
        preempt_priority: 0,
        allocated: vec![sched_core::entity::NSpec {
            node: n1,
            seq_num: 0,
            sub_seq_num: 0,
            end_of_chunk: true,
            resources_used: low_select[0].resources.clone(),
        }],
        ..blank_job(id, ranks.alloc(), "low", "intern", Some(q), low_select, PlaceSpec::default(), 10_000, 0)
    });
    sinfo.node_mut(n1).unwrap().resources.get_mut("ncpus").unwrap().assigned = ResourceValue::Long(4);

    let high_job = queued_job(&mut sinfo, &ranks, q, &mut ctx.resource_defs, "high", "director", "1:ncpus=4", "free", 600, 50);
    sinfo.resv_mut(high_job).unwrap().preempt_priority = 100;

    let mut cfg = default_cfg();
    cfg.preemptive_sched = true;
    cfg.preempt_methods = vec![sched_core::preempt::PreemptMethod::Requeue];

    let actions = run_cycle(&mut ctx, &mut sinfo, &cfg);

    let action = actions.iter().find(|a| matches!(a, RunAction::Preempted { job, .. } if *job == high_job));
    let Some(RunAction::Preempted { targets, .. }) = action else {
        panic!("expected job high to trigger preemption, got {actions:?}");
    };
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].job, low_job);
    assert!(sinfo.resv(low_job).unwrap().state == State::Job(JobState::Exiting));
}
