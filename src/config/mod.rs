//! Config surface: `sched_config`, the holidays file, and the
//! dedicated-time file. The resource-group and usage file formats live
//! under `fairshare/`, next to the tree they populate.

pub mod dedicated_time;
pub mod holidays;
pub mod sched_config;

pub use dedicated_time::{parse_dedicated_time, DedicatedWindow};
pub use holidays::{parse_holidays, DayBoundary, Holiday, HolidaysFile, WeekSchedule};
pub use sched_config::{parse_config, ProvisionPolicy, SchedConfig, SmpClusterDist};
