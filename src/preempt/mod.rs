//! Preemption: frees resources held by lower-class running jobs so a
//! blocked higher-class job can run.

pub mod preempt;

pub use preempt::{select_preemption_targets, PreemptAction, PreemptMethod};
