//! Fairshare: the resource-group tree, usage accounting, and the
//! on-disk USAGE file.

pub mod resource_group;
pub mod tree;
pub mod usage_file;

pub use resource_group::parse_group;
pub use tree::{FairshareTree, FsNode, FsNodeId, ROOT_NAME, UNKNOWN_NAME};
pub use usage_file::{read_usage, write_usage};
