//! Calendar and simulator: the event timeline and the clone-then-
//! simulate-then-commit machinery backfill and preemption build on.

pub mod event;
pub mod event_list;
pub mod simulator;

pub use event::{EventKind, TimedEvent};
pub use event_list::{EventList, EventListKey};
pub use simulator::{calc_run_time, create_event_list, simulate_events, SimCommand};
