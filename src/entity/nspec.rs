use super::ids::NodeId;
use crate::resource::ResourceList;

/// A single `(node, chunk_seq, resources_used_from_node)` binding: one
/// node's contribution to a chunk of a job's placement.
#[derive(Debug, Clone)]
pub struct NSpec {
    pub node: NodeId,
    /// Preserves the `select` chunk order (which `+`-separated term this
    /// came from).
    pub seq_num: u32,
    /// Preserves allocation order *within* one chunk, when a chunk spans
    /// more than one node.
    pub sub_seq_num: u32,
    /// True when this nspec is the last one satisfying its chunk (used to
    /// know when to move on to the next `seq_num` while rendering
    /// `exec_vnode`).
    pub end_of_chunk: bool,
    pub resources_used: ResourceList,
}

/// The placement of one job on the cluster: the ordered output of node
/// selection.
pub type NSpecArray = Vec<NSpec>;

/// Renders an `nspec[]` into the `exec_vnode` wire form:
/// `(vnode1:ncpus=N:mem=Mkb)+(vnode2:...)`.
pub fn render_exec_vnode(nspecs: &[NSpec], node_name: impl Fn(NodeId) -> String) -> String {
    nspecs
        .iter()
        .map(|n| {
            let mut parts = vec![node_name(n.node)];
            for entry in n.resources_used.iter() {
                parts.push(format!("{}={}", entry.def.name, entry.assigned.encode()));
            }
            format!("({})", parts.join(":"))
        })
        .collect::<Vec<_>>()
        .join("+")
}
