//! Snapshot loader: deserializes the wire JSON form of a server/queue/
//! node/job universe into the internal arena model (`entity::ServerInfo`).
//!
//! The wire format mirrors what `qstat -f -F json`/`pbsnodes -F json` report:
//! flat string-keyed resource maps rather than typed values, so every
//! resource has to be resolved against a [`crate::resource::ResourceDefRegistry`]
//! on the way in.

use crate::entity::{
    JobState, NodeInfo, NodeStateFlags, PrevJobInfo, QueueFlags, QueueInfo, QueueLimits, QueueType, RankAllocator, ResourceResv, ResvKind,
    ResvState, ServerInfo, ShareType, State,
};
use crate::error::{Error, Result};
use crate::resource::{ResourceDefRegistry, ResourceEntry, ResourceList, ResourceValue};
use crate::selector::{parse_place, parse_select};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct NodeDto {
    pub name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub state: Vec<String>,
    #[serde(default)]
    pub resources_available: HashMap<String, String>,
    #[serde(default)]
    pub resources_assigned: HashMap<String, String>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub current_aoe: Option<String>,
    #[serde(default)]
    pub provisionable: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct QueueLimitsDto {
    #[serde(default)]
    pub max_running: Option<u32>,
    #[serde(default)]
    pub max_user: HashMap<String, u32>,
    #[serde(default)]
    pub max_group: HashMap<String, u32>,
    #[serde(default)]
    pub max_project: HashMap<String, u32>,
}

#[derive(Debug, Deserialize)]
pub struct QueueDto {
    pub name: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub queue_type: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub started: bool,
    #[serde(default)]
    pub limits: QueueLimitsDto,
    #[serde(default)]
    pub is_dedicated: bool,
    #[serde(default)]
    pub is_prime_only: bool,
    #[serde(default)]
    pub is_nonprime_only: bool,
    #[serde(default)]
    pub backfill_depth: Option<u32>,
    #[serde(default)]
    pub node_group_key: Option<String>,
    #[serde(default)]
    pub topjobs_quota: Option<u32>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct JobDto {
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub resreq: HashMap<String, String>,
    pub select: String,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub duration: i64,
    pub state: String,
    #[serde(default)]
    pub preempt_priority: i32,
    #[serde(default)]
    pub job_priority: i64,
    #[serde(default)]
    pub eligible_time: Option<i64>,
    #[serde(default)]
    pub fair_share_entity: Option<String>,
    #[serde(default)]
    pub preempt_targets: Option<Vec<String>>,
    #[serde(default)]
    pub standing: bool,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotDto {
    pub server_time: i64,
    #[serde(default)]
    pub server_resources: HashMap<String, String>,
    #[serde(default)]
    pub nodes: Vec<NodeDto>,
    #[serde(default)]
    pub queues: Vec<QueueDto>,
    #[serde(default)]
    pub jobs: Vec<JobDto>,
}

fn parse_resource_map(map: &HashMap<String, String>, registry: &mut ResourceDefRegistry) -> Result<ResourceList> {
    let mut list = ResourceList::new();
    for (name, raw) in map {
        let def = registry.get_or_register_generic(name);
        let value = ResourceValue::parse(name, def.kind, raw)?;
        list.insert(ResourceEntry::new(def, value));
    }
    Ok(list)
}

fn parse_node_state(tokens: &[String]) -> NodeStateFlags {
    let mut state = NodeStateFlags::free();
    for token in tokens {
        match token.as_str() {
            "offline" => state.offline = true,
            "down" => state.down = true,
            "stale" => state.stale = true,
            "sleeping" => state.sleeping = true,
            "provisioning" => state.provisioning = true,
            "exclusive" => state.exclusive = true,
            "resv-exclusive" => state.resv_excl = true,
            "free" => {}
            _ => {}
        }
    }
    state
}

fn parse_queue_type(raw: Option<&str>) -> QueueType {
    match raw {
        Some("route") => QueueType::Route,
        _ => QueueType::Execution,
    }
}

fn parse_job_state(raw: &str) -> Result<State> {
    match raw {
        "Q" | "Queued" => Ok(State::Job(JobState::Queued)),
        "R" | "Running" => Ok(State::Job(JobState::Running)),
        "E" | "Exiting" => Ok(State::Job(JobState::Exiting)),
        "H" | "Held" => Ok(State::Job(JobState::Held)),
        "S" | "Suspended" => Ok(State::Job(JobState::Suspended)),
        "W" | "Waiting" => Ok(State::Job(JobState::Waiting)),
        "T" | "Transit" => Ok(State::Job(JobState::Transit)),
        "Unconfirmed" => Ok(State::Resv(ResvState::Unconfirmed)),
        "Confirmed" => Ok(State::Resv(ResvState::Confirmed)),
        "Degraded" => Ok(State::Resv(ResvState::Degraded)),
        "RESV_RUNNING" => Ok(State::Resv(ResvState::Running)),
        "Finished" => Ok(State::Resv(ResvState::Finished)),
        other => Err(Error::BadSelectSpec(format!("unknown job/reservation state: {other}"))),
    }
}

/// Loads a snapshot JSON file and builds a fresh `ServerInfo`, resolving
/// every resource against `registry` (mutating it with any site-custom
/// resource names it hasn't seen before) and stamping every entity with a
/// rank from `ranks`.
pub fn load_snapshot(path: impl AsRef<Path>, registry: &mut ResourceDefRegistry, ranks: &RankAllocator) -> Result<ServerInfo> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    load_snapshot_str(&contents, registry, ranks)
}

pub fn load_snapshot_str(contents: &str, registry: &mut ResourceDefRegistry, ranks: &RankAllocator) -> Result<ServerInfo> {
    let dto: SnapshotDto = serde_json::from_str(contents)?;
    let mut sinfo = ServerInfo::new(dto.server_time);
    sinfo.server_resources = parse_resource_map(&dto.server_resources, registry)?;

    for q in &dto.queues {
        let rank = ranks.alloc();
        let qtype = parse_queue_type(q.queue_type.as_deref());
        sinfo.add_queue(|id| QueueInfo {
            id,
            rank,
            name: q.name.clone(),
            priority: q.priority,
            qtype,
            enabled: q.enabled,
            started: q.started,
            limits: QueueLimits {
                max_running: q.limits.max_running,
                max_user: q.limits.max_user.clone(),
                max_group: q.limits.max_group.clone(),
                max_project: q.limits.max_project.clone(),
            },
            nodes: None,
            partition: None,
            flags: QueueFlags { is_dedicated: q.is_dedicated, is_prime_only: q.is_prime_only, is_nonprime_only: q.is_nonprime_only },
            backfill_depth: q.backfill_depth,
            node_group_key: q.node_group_key.clone(),
            topjobs_quota: q.topjobs_quota,
        });
    }

    for n in &dto.nodes {
        let rank = ranks.alloc();
        let resources = parse_resource_map(&n.resources_available, registry)?;
        let assigned = parse_resource_map(&n.resources_assigned, registry)?;
        let queue = n.queue.as_deref().and_then(|name| sinfo.name_to_queue.get(name).copied());
        let host = n.host.clone().unwrap_or_else(|| n.name.clone());
        sinfo.add_node(|id| {
            let mut node = NodeInfo::new(id, rank, n.name.clone(), host, resources);
            node.state = parse_node_state(&n.state);
            node.queue = queue;
            node.current_aoe = n.current_aoe.clone();
            node.provisionable = n.provisionable;
            for entry in assigned.iter() {
                if let Some(slot) = node.resources.get_mut(&entry.def.name) {
                    slot.assigned = entry.assigned.clone();
                }
            }
            node
        });
    }

    for j in &dto.jobs {
        let rank = ranks.alloc();
        let queue = j.queue.as_deref().and_then(|name| sinfo.name_to_queue.get(name).copied());
        let resreq = parse_resource_map(&j.resreq, registry)?;
        let select = parse_select(&j.select, registry)?;
        let place = parse_place(&j.place)?;
        let kind = match j.kind.as_deref() {
            Some("reservation") => ResvKind::Reservation,
            _ => ResvKind::Job,
        };
        let state = parse_job_state(&j.state)?;
        let duration = j.duration;

        sinfo.add_resv(|id| ResourceResv {
            id,
            rank,
            name: j.name.clone(),
            owner: j.owner.clone(),
            queue,
            kind,
            resreq,
            select,
            place,
            start: j.start,
            end: j.start.map(|s| s + duration),
            duration,
            state,
            run_event: None,
            end_event: None,
            allocated: Vec::new(),
            share_group_leader: None,
            share_type: ShareType::Ignore,
            preempt_priority: j.preempt_priority,
            job_priority: j.job_priority,
            eligible_time: j.eligible_time,
            fair_share_entity: j.fair_share_entity.clone(),
            shrink_bounds: None,
            preempt_targets: j.preempt_targets.clone(),
            standing: j.standing,
            is_topjob: false,
            topjob_ineligible: false,
            comment: None,
            prev: PrevJobInfo::default(),
        });
    }

    sinfo.refresh_state_count();
    Ok(sinfo)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"
    {
        "server_time": 1000,
        "queues": [
            {"name": "workq", "queue_type": "execution"}
        ],
        "nodes": [
            {"name": "n1", "resources_available": {"ncpus": "8", "mem": "16gb"}}
        ],
        "jobs": [
            {"name": "job1", "owner": "alice", "queue": "workq", "select": "1:ncpus=2", "place": "free", "state": "Q"}
        ]
    }
    "#;

    #[test]
    fn loads_nodes_queues_and_jobs_from_json() {
        let mut registry = ResourceDefRegistry::new();
        let ranks = RankAllocator::new();
        let sinfo = load_snapshot_str(SNAPSHOT, &mut registry, &ranks).unwrap();

        assert_eq!(sinfo.server_time, 1000);
        assert_eq!(sinfo.nodes.len(), 1);
        assert_eq!(sinfo.queues.len(), 1);
        assert_eq!(sinfo.resvs.len(), 1);

        let node = sinfo.nodes.values().next().unwrap();
        assert!(node.resources.get("ncpus").is_some());
        assert_eq!(node.resources.unused("ncpus"), Some(ResourceValue::Long(8)));
    }

    #[test]
    fn job_select_spec_is_parsed_into_chunks() {
        let mut registry = ResourceDefRegistry::new();
        let ranks = RankAllocator::new();
        let sinfo = load_snapshot_str(SNAPSHOT, &mut registry, &ranks).unwrap();
        let job = sinfo.resvs.values().next().unwrap();
        assert_eq!(job.select.len(), 1);
        assert_eq!(job.select[0].num_chunks, 1);
    }

    #[test]
    fn rejects_an_unknown_job_state() {
        let bad = SNAPSHOT.replace("\"state\": \"Q\"", "\"state\": \"bogus\"");
        let mut registry = ResourceDefRegistry::new();
        let ranks = RankAllocator::new();
        assert!(load_snapshot_str(&bad, &mut registry, &ranks).is_err());
    }
}
