use super::resource_resv::{JobState, ResourceResv};

/// Counts of jobs by state, kept at both the server and queue level and
/// used by hard-limit checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateCount {
    pub queued: u32,
    pub running: u32,
    pub exiting: u32,
    pub held: u32,
    pub suspended: u32,
    pub waiting: u32,
    pub transit: u32,
}

impl StateCount {
    pub fn total(&self) -> u32 {
        self.queued + self.running + self.exiting + self.held + self.suspended + self.waiting + self.transit
    }

    pub fn record(&mut self, job: &ResourceResv) {
        if !job.is_job() {
            return;
        }
        let super::resource_resv::State::Job(js) = job.state else { return };
        match js {
            JobState::Queued => self.queued += 1,
            JobState::Running => self.running += 1,
            JobState::Exiting => self.exiting += 1,
            JobState::Held => self.held += 1,
            JobState::Suspended => self.suspended += 1,
            JobState::Waiting => self.waiting += 1,
            JobState::Transit => self.transit += 1,
        }
    }

    pub fn from_jobs<'a>(jobs: impl Iterator<Item = &'a ResourceResv>) -> Self {
        let mut sc = StateCount::default();
        for j in jobs {
            sc.record(j);
        }
        sc
    }
}
