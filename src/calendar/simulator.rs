use super::event::{EventKind, TimedEvent};
use super::event_list::EventList;
use crate::entity::{PolicyState, QueueInfo, ResourceResv, ServerInfo};
use crate::eligibility::{is_ok_to_run, CheckFlags, NodeAllocator};

/// Seeds the calendar from the current universe -- one run+end pair per
/// confirmed reservation, one end event per
/// running job, and dedicated-time boundaries from the policy tables
/// (node-up events are added separately as nodes finish provisioning,
/// since that isn't part of the static snapshot).
pub fn create_event_list(sinfo: &ServerInfo, dedtime_windows: &[(i64, i64)]) -> EventList {
    let mut list = EventList::new();

    for resv in sinfo.confirmed_reservations() {
        if let Some(start) = resv.start {
            list.insert(TimedEvent::new(start, EventKind::Run(resv.id)));
        }
        if let Some(end) = resv.end {
            list.insert(TimedEvent::new(end, EventKind::End(resv.id)));
        }
    }

    for job in sinfo.running_jobs() {
        if let Some(end) = job.end {
            list.insert(TimedEvent::new(end, EventKind::End(job.id)));
        }
    }

    for &(start, end) in dedtime_windows {
        list.insert(TimedEvent::new(start, EventKind::DedTimeStart));
        list.insert(TimedEvent::new(end, EventKind::DedTimeEnd));
    }

    list
}

/// What `simulate_events` was asked to stop at.
#[derive(Debug, Clone, Copy)]
pub enum SimCommand {
    /// Advance exactly one event (or `n`, if given).
    NextEvent(usize),
    /// Advance until `sim_time` reaches `t`.
    Until(i64),
}

/// Advances `sim_time` by replaying calendar events against `sinfo`,
/// mutating it as each event's callback would.
/// Stops at `cmd`. Returns the final simulated time.
pub fn simulate_events(policy: &mut PolicyState, sinfo: &mut ServerInfo, calendar: &mut EventList, cmd: SimCommand) -> i64 {
    let mut sim_time = sinfo.server_time;
    let mut advanced = 0usize;

    loop {
        match cmd {
            SimCommand::NextEvent(n) if advanced >= n => break,
            SimCommand::Until(t) => {
                let Some(next) = calendar.peek_next() else { break };
                if next.time > t {
                    sim_time = t;
                    break;
                }
            }
            _ => {}
        }

        let Some(event) = calendar.take_next() else { break };
        sim_time = event.time;
        apply_event(policy, sinfo, &event);
        advanced += 1;
    }

    sinfo.server_time = sim_time;
    sim_time
}

fn apply_event(policy: &mut PolicyState, sinfo: &mut ServerInfo, event: &TimedEvent) {
    match &event.kind {
        EventKind::Run(id) => {
            if let Some(resv) = sinfo.resv_mut(*id) {
                charge_run(resv);
            }
        }
        EventKind::End(id) => {
            if let Some(resv) = sinfo.resv_mut(*id) {
                release_end(resv);
            }
            free_allocated_resources(sinfo, *id);
        }
        EventKind::DedTimeStart => policy.is_ded_time = true,
        EventKind::DedTimeEnd => policy.is_ded_time = false,
        EventKind::PolicyChange => policy.is_prime_time = !policy.is_prime_time,
        EventKind::NodeUp(node_id) => {
            if let Some(node) = sinfo.node_mut(*node_id) {
                node.state.sleeping = false;
            }
        }
    }
    sinfo.refresh_state_count();
}

fn charge_run(resv: &mut ResourceResv) {
    use crate::entity::{JobState, ResvState, State};
    resv.state = match resv.kind {
        crate::entity::ResvKind::Job => State::Job(JobState::Running),
        crate::entity::ResvKind::Reservation => State::Resv(ResvState::Running),
    };
}

/// Undoes the node-level `assigned` bump `commit_run` applies, so a job's
/// capacity becomes available again to later events in the same simulated
/// walk. Mirrors `commit_run`'s accumulation in reverse.
fn free_allocated_resources(sinfo: &mut ServerInfo, id: crate::entity::ResvId) {
    let Some(resv) = sinfo.resv(id) else { return };
    let nspecs = resv.allocated.clone();
    for n in &nspecs {
        if let Some(node) = sinfo.node_mut(n.node) {
            for (name, amount) in n.resources_used.iter().map(|e| (e.def.name.clone(), e.assigned.clone())) {
                if let Some(entry) = node.resources.get_mut(&name) {
                    entry.assigned = entry.assigned.subtract(&amount).unwrap_or_else(|_| entry.assigned.clone());
                }
            }
        }
    }
}

fn release_end(resv: &mut ResourceResv) {
    use crate::entity::{JobState, ResvState, State};
    resv.state = match resv.kind {
        crate::entity::ResvKind::Job => State::Job(JobState::Exiting),
        crate::entity::ResvKind::Reservation => State::Resv(ResvState::Finished),
    };
}

/// Clones the universe, simulates forward event by event, and stops at
/// the first simulated time where `candidate` passes
/// `is_ok_to_run`. Returns the simulated start time and its allocation
/// without mutating the caller's real universe or calendar.
pub fn calc_run_time(
    policy: &PolicyState,
    sinfo: &ServerInfo,
    calendar: &EventList,
    qinfo: &QueueInfo,
    candidate: &ResourceResv,
    allocator: &dyn NodeAllocator,
) -> Option<(i64, crate::entity::NSpecArray)> {
    let mut sim_policy = *policy;
    let mut sim_sinfo = sinfo.clone_for_simulation();
    let mut sim_calendar = calendar.clone();

    loop {
        let mut trial = candidate.clone();
        trial.start = Some(sim_sinfo.server_time);
        if let Ok(nspecs) = is_ok_to_run(&sim_policy, &sim_sinfo, qinfo, &trial, allocator, CheckFlags::default()) {
            return Some((sim_sinfo.server_time, nspecs));
        }

        if sim_calendar.is_exhausted() {
            return None;
        }
        simulate_events(&mut sim_policy, &mut sim_sinfo, &mut sim_calendar, SimCommand::NextEvent(1));
    }
}
