//! Data model: the in-memory entity universe the scheduler cycle reads
//! and mutates (`server_info`, `queue_info`, `node_info`, `resource_resv`,
//! `chunk`, `nspec`).

pub mod chunk;
pub mod ids;
pub mod node_info;
pub mod nspec;
pub mod queue_info;
pub mod resource_resv;
pub mod server_info;
pub mod state_count;

pub use chunk::{Arrangement, Chunk, PlaceSpec, Sharing};
pub use ids::{BucketId, EventId, NodeId, PartitionId, QueueId, Rank, RankAllocator, ResvId};
pub use node_info::{NodeInfo, NodeStateFlags};
pub use nspec::{render_exec_vnode, NSpec, NSpecArray};
pub use queue_info::{QueueFlags, QueueInfo, QueueLimits, QueueType};
pub use resource_resv::{JobState, PrevJobInfo, ResourceResv, ResvKind, ResvState, ShareType, State};
pub use server_info::{PolicyState, ServerInfo};
pub use state_count::StateCount;
