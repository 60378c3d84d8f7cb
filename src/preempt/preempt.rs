use crate::entity::{ResourceResv, ResvId, ServerInfo};
use crate::resource::{Availability, ResourceValue};
use crate::sort::cmp_preemption_candidates;

/// The preemption methods, tried in configured order against each
/// chosen candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptMethod {
    Suspend,
    Checkpoint,
    Requeue,
    Delete,
}

impl PreemptMethod {
    pub fn code(&self) -> char {
        match self {
            PreemptMethod::Suspend => 'S',
            PreemptMethod::Checkpoint => 'C',
            PreemptMethod::Requeue => 'R',
            PreemptMethod::Delete => 'D',
        }
    }

    pub fn from_code(c: char) -> Option<Self> {
        match c {
            'S' => Some(PreemptMethod::Suspend),
            'C' => Some(PreemptMethod::Checkpoint),
            'R' => Some(PreemptMethod::Requeue),
            'D' => Some(PreemptMethod::Delete),
            _ => None,
        }
    }
}

/// One job selected for preemption and the method that will be applied.
#[derive(Debug, Clone)]
pub struct PreemptAction {
    pub job: ResvId,
    pub method: PreemptMethod,
}

/// Selects a minimal set of lower-class running jobs whose
/// termination frees enough resources for `blocked` to fit, restricted to
/// `preempt_targets` if the job named one. Candidates are tried in
/// `cmp_preempt_priority_asc` / `cmp_preempt_stime_asc` order (weakest,
/// most-recently-started first) and simulated-ended one at a time until
/// the accumulated freed resources satisfy every chunk of `blocked`'s
/// `select`.
pub fn select_preemption_targets(sinfo: &ServerInfo, blocked: &ResourceResv, methods: &[PreemptMethod]) -> Option<Vec<PreemptAction>> {
    let mut candidates: Vec<&ResourceResv> = sinfo
        .running_jobs()
        .filter(|j| j.preempt_priority < blocked.preempt_priority)
        .filter(|j| match &blocked.preempt_targets {
            Some(targets) => targets.iter().any(|t| t == &j.name || t == &j.owner),
            None => true,
        })
        .collect();
    candidates.sort_by(|a, b| cmp_preemption_candidates(a, b));

    let needed = total_consumable_demand(blocked);
    let mut freed: std::collections::HashMap<String, ResourceValue> = std::collections::HashMap::new();
    let mut actions = Vec::new();

    for candidate in candidates {
        if satisfies(&freed, &needed) {
            break;
        }
        accumulate(&mut freed, candidate);
        let method = methods.first().copied().unwrap_or(PreemptMethod::Requeue);
        actions.push(PreemptAction { job: candidate.id, method });
    }

    if satisfies(&freed, &needed) {
        Some(actions)
    } else {
        None
    }
}

fn total_consumable_demand(job: &ResourceResv) -> std::collections::HashMap<String, ResourceValue> {
    let mut demand = std::collections::HashMap::new();
    for chunk in &job.select {
        for entry in chunk.resources.iter() {
            if !entry.def.flags.consumable {
                continue;
            }
            let Availability::Direct(v) = &entry.available else { continue };
            let per_chunk = match v {
                ResourceValue::Long(n) => ResourceValue::Long(n * chunk.num_chunks as i64),
                other => other.clone(),
            };
            let slot = demand.entry(entry.def.name.clone()).or_insert(ResourceValue::Long(0));
            *slot = slot.add(&per_chunk).unwrap_or(per_chunk);
        }
    }
    demand
}

fn accumulate(freed: &mut std::collections::HashMap<String, ResourceValue>, job: &ResourceResv) {
    for (name, amount) in total_consumable_demand(job) {
        let slot = freed.entry(name).or_insert(ResourceValue::Long(0));
        *slot = slot.add(&amount).unwrap_or_else(|_| amount.clone());
    }
}

fn satisfies(freed: &std::collections::HashMap<String, ResourceValue>, needed: &std::collections::HashMap<String, ResourceValue>) -> bool {
    needed.iter().all(|(name, need)| match freed.get(name) {
        Some(have) => !matches!(have.compare(need), crate::resource::CompareResult::Lt),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Chunk, JobState, PlaceSpec, PrevJobInfo, ResvKind, ShareType, State};
    use crate::resource::{ResourceDefRegistry, ResourceEntry, ResourceList};
    use slotmap::SlotMap;

    fn running_job(rank: u32, preempt_priority: i32, start: i64, ncpus: i64) -> ResourceResv {
        let reg = ResourceDefRegistry::new();
        let mut m: SlotMap<ResvId, ()> = SlotMap::with_key();
        let id = m.insert(());
        let mut resources = ResourceList::new();
        resources.insert(ResourceEntry::new(reg.get("ncpus").unwrap(), ResourceValue::Long(ncpus)));
        ResourceResv {
            id,
            rank: crate::entity::Rank(rank),
            name: format!("job{rank}"),
            owner: "a".into(),
            queue: None,
            kind: ResvKind::Job,
            resreq: ResourceList::new(),
            select: vec![Chunk { num_chunks: 1, resources }],
            place: PlaceSpec::default(),
            start: Some(start),
            end: None,
            duration: 0,
            state: State::Job(JobState::Running),
            run_event: None,
            end_event: None,
            allocated: Vec::new(),
            share_group_leader: None,
            share_type: ShareType::Ignore,
            preempt_priority,
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

    fn blocked_job(ncpus_needed: i64, preempt_priority: i32) -> ResourceResv {
        let reg = ResourceDefRegistry::new();
        let mut m: SlotMap<ResvId, ()> = SlotMap::with_key();
        let id = m.insert(());
        let mut resources = ResourceList::new();
        resources.insert(ResourceEntry::new(reg.get("ncpus").unwrap(), ResourceValue::Long(ncpus_needed)));
        ResourceResv {
            id,
            rank: crate::entity::Rank(99),
            name: "blocked".into(),
            owner: "b".into(),
            queue: None,
            kind: ResvKind::Job,
            resreq: ResourceList::new(),
            select: vec![Chunk { num_chunks: 1, resources }],
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
            preempt_priority,
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
    fn selects_oldest_weakest_jobs_first() {
        let mut sinfo = ServerInfo::new(0);
        sinfo.add_resv(|_| running_job(1, 0, 200, 4));
        sinfo.add_resv(|_| running_job(2, 0, 100, 4));

        let blocked = blocked_job(4, 10);
        let actions = select_preemption_targets(&sinfo, &blocked, &[PreemptMethod::Requeue]).unwrap();
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn returns_none_when_no_combination_frees_enough() {
        let mut sinfo = ServerInfo::new(0);
        sinfo.add_resv(|_| running_job(1, 0, 100, 2));

        let blocked = blocked_job(100, 10);
        assert!(select_preemption_targets(&sinfo, &blocked, &[PreemptMethod::Delete]).is_none());
    }
}
