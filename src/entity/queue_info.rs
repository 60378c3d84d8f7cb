use super::ids::{NodeId, QueueId, Rank};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueType {
    Execution,
    Route,
}

#[derive(Debug, Clone, Default)]
pub struct QueueLimits {
    pub max_running: Option<u32>,
    pub max_user: HashMap<String, u32>,
    pub max_group: HashMap<String, u32>,
    pub max_project: HashMap<String, u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFlags {
    pub is_dedicated: bool,
    pub is_prime_only: bool,
    pub is_nonprime_only: bool,
}

#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub id: QueueId,
    pub rank: Rank,
    pub name: String,
    pub priority: i64,
    pub qtype: QueueType,
    pub enabled: bool,
    pub started: bool,
    pub limits: QueueLimits,
    /// Nodes exclusively owned by this queue, if any (a "node-assigned" queue).
    pub nodes: Option<Vec<NodeId>>,
    pub partition: Option<String>,
    pub flags: QueueFlags,
    /// Overrides the server-wide `backfill_depth` when set.
    pub backfill_depth: Option<u32>,
    pub node_group_key: Option<String>,
    /// Per-queue top-job quota (`per_queues_topjobs`), when this queue
    /// is a "set aside" queue.
    pub topjobs_quota: Option<u32>,
}

impl QueueInfo {
    pub fn new(id: QueueId, rank: Rank, name: impl Into<String>, qtype: QueueType) -> Self {
        QueueInfo {
            id,
            rank,
            name: name.into(),
            priority: 0,
            qtype,
            enabled: true,
            started: true,
            limits: QueueLimits::default(),
            nodes: None,
            partition: None,
            flags: QueueFlags::default(),
            backfill_depth: None,
            node_group_key: None,
            topjobs_quota: None,
        }
    }

    pub fn is_runnable(&self) -> bool {
        self.enabled && self.started && self.qtype == QueueType::Execution
    }
}
