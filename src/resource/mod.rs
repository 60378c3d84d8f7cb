//! Resource model: typed values, process-wide definitions, and the
//! ordered resource list entities carry.

pub mod def;
pub mod list;
pub mod value;

pub use def::{ResourceDef, ResourceDefRegistry, ResourceFlags, ResourceKind};
pub use list::{Availability, ResourceEntry, ResourceList};
pub use value::{CompareResult, ResourceValue, SizeUnit, SizeValue};
