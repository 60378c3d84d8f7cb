use super::chunk::{Chunk, PlaceSpec};
use super::ids::{EventId, QueueId, Rank, ResvId};
use super::nspec::NSpecArray;
use crate::resource::ResourceList;

/// Jobs and advance reservations share this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResvKind {
    Job,
    Reservation,
}

/// Coarse job lifecycle state. Distinct from `ResvState` (which additionally
/// covers advance-reservation-only states).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Exiting,
    Held,
    Suspended,
    Waiting,
    Transit,
}

/// Advance reservation state, superset used when `kind == Reservation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResvState {
    Unconfirmed,
    Confirmed,
    Degraded,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Job(JobState),
    Resv(ResvState),
}

/// How a job participates in a fairshare share group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareType {
    #[default]
    Ignore,
    Limited,
    Borrow,
}

/// Snapshot of the previous cycle's `comment`/state for a job, kept so the
/// cycle driver can skip a redundant RPC update when nothing changed. Never
/// persisted; populated by the cycle driver, not the loader.
#[derive(Debug, Clone, Default)]
pub struct PrevJobInfo {
    pub prev_comment: Option<String>,
    pub prev_state: Option<String>,
}

/// Unifies jobs and advance reservations.
#[derive(Debug, Clone)]
pub struct ResourceResv {
    pub id: ResvId,
    pub rank: Rank,
    pub name: String,
    pub owner: String,
    pub queue: Option<QueueId>,
    pub kind: ResvKind,

    /// Aggregated resource request across all chunks (used by rassn checks).
    pub resreq: ResourceList,
    pub select: Vec<Chunk>,
    pub place: PlaceSpec,

    pub start: Option<i64>,
    pub end: Option<i64>,
    pub duration: i64,

    pub state: State,
    pub run_event: Option<EventId>,
    pub end_event: Option<EventId>,

    pub allocated: NSpecArray,

    pub share_group_leader: Option<ResvId>,
    pub share_type: ShareType,
    pub preempt_priority: i32,

    /// Process-local priority used by the "highway" operator-boost
    /// ordering.
    pub job_priority: i64,
    pub eligible_time: Option<i64>,
    pub fair_share_entity: Option<String>,

    /// Present when the job's walltime can be shrunk to fit:
    /// `(min_walltime, max_walltime)`.
    pub shrink_bounds: Option<(i64, i64)>,

    /// Restricts preemption candidates to this named subset, if set.
    pub preempt_targets: Option<Vec<String>>,

    /// Whether a reservation with `standing` semantics -- occurrences are
    /// not expanded (Non-goal), the flag is retained only so loaders/echo
    /// paths don't lose it.
    pub standing: bool,

    /// Set once `per_queues_topjobs`/`per_share_topjobs`/`backfill_depth`
    /// admits the job into the calendar as a backfill placeholder.
    pub is_topjob: bool,
    pub topjob_ineligible: bool,

    pub comment: Option<String>,
    pub prev: PrevJobInfo,
}

impl ResourceResv {
    pub fn is_job(&self) -> bool {
        self.kind == ResvKind::Job
    }

    pub fn is_reservation(&self) -> bool {
        self.kind == ResvKind::Reservation
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Job(JobState::Running) | State::Resv(ResvState::Running))
    }

    pub fn is_queued(&self) -> bool {
        matches!(self.state, State::Job(JobState::Queued))
    }

    pub fn total_chunks(&self) -> u32 {
        self.select.iter().map(|c| c.num_chunks).sum()
    }

    pub fn set_comment(&mut self, can_never_run: bool, reason: &str) {
        self.comment = Some(if can_never_run { format!("Can Never Run: {reason}") } else { format!("Not Running: {reason}") });
    }
}
