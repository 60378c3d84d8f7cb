use crate::entity::{NodeInfo, ResourceResv};
use crate::resource::ResourceValue;

/// Ascending or descending, per each key of a `multi_sort` spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Which part of a resource's accounting a node/bucket/partition sort
/// reads, per `enum resource_fields` (`find_node_amount`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceField {
    Total,
    Unused,
    Assigned,
}

/// One sort key: either a named resource (compared through `ResourceField`
/// on nodes, or raw `resreq` amount on jobs) or one of the special scalar
/// keys that gets its own comparator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Resource(String),
    FairSharePerc,
    JobPriority,
    SortPriority,
    PreemptPriority,
    EligibleTime,
    /// `cmp_job_sort_formula`: the scheduler-formula evaluated value.
    Formula,
}

/// One entry of a `job_sort_formula`/`node_sort_key` configuration line:
/// a key, its direction, and (for node-side sorts) which resource field
/// to read.
#[derive(Debug, Clone)]
pub struct SortInfo {
    pub key: SortKey,
    pub direction: Direction,
    pub res_field: ResourceField,
}

impl SortInfo {
    pub fn new(key: SortKey, direction: Direction) -> Self {
        SortInfo { key, direction, res_field: ResourceField::Total }
    }

    pub fn with_field(mut self, field: ResourceField) -> Self {
        self.res_field = field;
        self
    }
}

/// `find_resresv_amount`: resolves one sort key to a comparable number for
/// a job/reservation. Special keys read from the job's own scalar fields;
/// a named resource reads from `resreq`.
pub fn find_resresv_amount(resresv: &ResourceResv, key: &SortKey, fairshare_perc: Option<f64>) -> f64 {
    match key {
        SortKey::Resource(name) => match resresv.resreq.get(name).map(|e| &e.available) {
            Some(crate::resource::Availability::Direct(v)) => resource_value_to_f64(v),
            _ => 0.0,
        },
        SortKey::FairSharePerc => fairshare_perc.unwrap_or(0.0),
        SortKey::JobPriority => resresv.job_priority as f64,
        SortKey::SortPriority => resresv.job_priority as f64,
        SortKey::PreemptPriority => resresv.preempt_priority as f64,
        SortKey::EligibleTime => resresv.eligible_time.unwrap_or(i64::MAX) as f64,
        SortKey::Formula => resresv.job_priority as f64,
    }
}

/// `find_node_amount`: resolves a named resource on a node to the part of
/// its accounting (`total`, `unused`, or `assigned`) the sort key asks for.
pub fn find_node_amount(ninfo: &NodeInfo, name: &str, field: ResourceField) -> f64 {
    let Some(entry) = ninfo.resources.get(name) else { return 0.0 };
    match field {
        ResourceField::Total => match &entry.available {
            crate::resource::Availability::Direct(v) => resource_value_to_f64(v),
            crate::resource::Availability::Indirect(_) => 0.0,
        },
        ResourceField::Assigned => resource_value_to_f64(&entry.assigned),
        ResourceField::Unused => ninfo.resources.unused(name).map(|v| resource_value_to_f64(&v)).unwrap_or(0.0),
    }
}

fn resource_value_to_f64(v: &ResourceValue) -> f64 {
    match v {
        ResourceValue::Long(n) => *n as f64,
        ResourceValue::Float(f) => *f,
        ResourceValue::Size(s) => s.to_bytes() as f64,
        ResourceValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        ResourceValue::Infinity => f64::INFINITY,
        _ => 0.0,
    }
}
