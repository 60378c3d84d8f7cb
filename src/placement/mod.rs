//! Placement sets and node buckets: partitioning the node universe
//! so candidate selection never has to scan the whole cluster per chunk.

pub mod bitmap;
pub mod bucket;
pub mod partition;

pub use bitmap::{DynamicBitmap, DynamicBitmapIter};
pub use bucket::{resource_signature, NodeBucket, PoolBitmap};
pub use partition::{
    build_buckets_for_partition, create_allpart, create_hostsets, create_node_partitions, sort_partitions_by_capacity, NodePartition,
    ALLPART_NAME, HOSTSETS_NAME,
};
