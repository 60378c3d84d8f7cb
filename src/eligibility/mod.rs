//! Eligibility checker: `is_ok_to_run`'s ordered checks, the STF
//! shrink-to-fit variant, and the stable failure-code taxonomy.

pub mod is_ok_to_run;
pub mod schd_error;
pub mod shrink;

pub use is_ok_to_run::{is_ok_to_run as check, CheckFlags, NodeAllocator};
pub use schd_error::{ErrorCode, SchdError, SchdErrorChain, StatusCode};
pub use shrink::{is_ok_to_run_stf, ShrinkBoundary};
