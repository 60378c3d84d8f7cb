//! Backfill and top-job selection: the ordered quota chain that
//! decides whether a job blocked by `is_ok_to_run` earns a calendar slot.

pub mod topjob;

pub use topjob::{admit_for_backfill, BackfillPolicy, BackfillQuotas};
