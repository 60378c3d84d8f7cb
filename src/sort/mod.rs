//! Sorting & selection: multi-key comparators for jobs, nodes, queues,
//! and preemption/starvation candidates.

pub mod multi_sort;
pub mod sort_info;

pub use multi_sort::{cmp_preemption_candidates, cmp_queue_prio_dsc, cmp_starving_jobs, multi_node_sort, multi_sort_jobs};
pub use sort_info::{find_node_amount, find_resresv_amount, Direction, ResourceField, SortInfo, SortKey};
