use slotmap::{new_key_type, SlotMap};
use std::cmp::Ordering;
use std::collections::HashMap;

new_key_type! { pub struct FsNodeId; }

pub const ROOT_NAME: &str = "root";
pub const UNKNOWN_NAME: &str = "unknown";

/// One node of the fairshare resource-group tree: a node's entitlement is
/// its `shares` relative to its siblings, and its usage accrues from every
/// job run by any entity under it.
#[derive(Debug, Clone)]
pub struct FsNode {
    pub name: String,
    pub parent: Option<FsNodeId>,
    pub children: Vec<FsNodeId>,
    pub shares: u32,
    /// Decayed, persisted usage (the quantity written to the USAGE file).
    pub usage: u64,
    /// Working copy reset to `usage` at the start of a cycle and charged
    /// as jobs are simulated to run, per `reset_temp_usage`.
    pub temp_usage: u64,
    /// This node's share of the whole machine, as a fraction of 1.0,
    /// computed by `calc_fair_share_perc`.
    pub tree_percentage: f64,
    /// `usage / tree_percentage`, the arbitrary usage factor from
    /// `calc_usage_factor` used to rank siblings independent of group size.
    pub usage_factor: f64,
}

impl FsNode {
    fn new(name: impl Into<String>, parent: Option<FsNodeId>, shares: u32) -> Self {
        FsNode { name: name.into(), parent, children: Vec::new(), shares, usage: 1, temp_usage: 1, tree_percentage: 0.0, usage_factor: 0.0 }
    }
}

/// The resource-group tree plus its root and `unknown` catch-all group.
/// Any entity charging usage that the resource group file never named
/// lands under `unknown`.
#[derive(Debug, Clone)]
pub struct FairshareTree {
    pub nodes: SlotMap<FsNodeId, FsNode>,
    pub root: FsNodeId,
    pub unknown: FsNodeId,
    by_name: HashMap<String, FsNodeId>,
}

impl FairshareTree {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(FsNode::new(ROOT_NAME, None, 1));
        let unknown = nodes.insert_with_key(|_| FsNode::new(UNKNOWN_NAME, Some(root), 1));
        nodes[root].children.push(unknown);

        let mut by_name = HashMap::new();
        by_name.insert(ROOT_NAME.to_string(), root);
        by_name.insert(UNKNOWN_NAME.to_string(), unknown);

        FairshareTree { nodes, root, unknown, by_name }
    }

    /// Adds `name` as a child of `parent` (defaulting to the root if
    /// `parent` is `None`), per `add_child`/`parse_group`.
    pub fn add_child(&mut self, name: &str, parent: Option<&str>, shares: u32) -> FsNodeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let parent_id = parent.and_then(|p| self.by_name.get(p).copied()).unwrap_or(self.root);
        let id = self.nodes.insert(FsNode::new(name, Some(parent_id), shares));
        self.nodes[parent_id].children.push(id);
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn find(&self, name: &str) -> Option<FsNodeId> {
        self.by_name.get(name).copied()
    }

    /// `find_alloc_ginfo`: resolves `name`, falling back to the `unknown`
    /// group rather than failing the cycle over one misconfigured entity.
    pub fn find_or_unknown(&self, name: &str) -> FsNodeId {
        self.find(name).unwrap_or(self.unknown)
    }

    /// Walks the tree computing each node's share of the whole machine:
    /// a node's percentage is its parent's percentage times
    /// `shares / sum(sibling shares)`. The root is 100%.
    pub fn calc_fair_share_perc(&mut self) {
        self.nodes[self.root].tree_percentage = 1.0;
        self.calc_perc_recursive(self.root);
    }

    fn calc_perc_recursive(&mut self, node: FsNodeId) {
        let children = self.nodes[node].children.clone();
        let total_shares: u32 = children.iter().map(|&c| self.nodes[c].shares.max(1)).sum();
        let parent_perc = self.nodes[node].tree_percentage;
        for &child in &children {
            let share = self.nodes[child].shares.max(1);
            let perc = if total_shares == 0 { 0.0 } else { parent_perc * (share as f64 / total_shares as f64) };
            self.nodes[child].tree_percentage = perc;
            self.calc_perc_recursive(child);
        }
    }

    /// Charges `amount` of usage to `name` and every ancestor up to the
    /// root, per `update_usage_on_run`.
    pub fn update_usage_on_run(&mut self, name: &str, amount: u64) {
        let mut cur = Some(self.find_or_unknown(name));
        while let Some(id) = cur {
            self.nodes[id].usage = self.nodes[id].usage.saturating_add(amount);
            self.nodes[id].temp_usage = self.nodes[id].temp_usage.saturating_add(amount);
            cur = self.nodes[id].parent;
        }
    }

    /// Resets every node's working usage back to its persisted usage,
    /// per `reset_temp_usage`. Called at the start of a cycle so usage
    /// charged while simulating can be discarded without touching the
    /// value that eventually gets written out.
    pub fn reset_temp_usage(&mut self) {
        let ids: Vec<_> = self.nodes.keys().collect();
        for id in ids {
            self.nodes[id].temp_usage = self.nodes[id].usage;
        }
    }

    /// Halves (or applies `decay_factor` to) every node's persisted usage,
    /// per `decay_fairshare_tree`. Run once every `fairshare_decay_time`.
    pub fn decay_fairshare_tree(&mut self, decay_factor: f64) {
        for node in self.nodes.values_mut() {
            let decayed = (node.usage as f64 * decay_factor).round() as u64;
            node.usage = decayed.max(1);
            node.temp_usage = node.usage;
        }
    }

    /// `usage_factor = usage / tree_percentage`, an allocation-size-
    /// independent figure used to rank unrelated siblings.
    pub fn calc_usage_factor(&mut self) {
        for node in self.nodes.values_mut() {
            node.usage_factor = if node.tree_percentage > 0.0 { node.temp_usage as f64 / node.tree_percentage } else { f64::INFINITY };
        }
    }

    /// True if `id` has used strictly more than its `tree_percentage`
    /// share of the root's total usage, per `over_fs_usage`.
    pub fn over_fs_usage(&self, id: FsNodeId) -> bool {
        let root_usage = self.nodes[self.root].temp_usage as f64;
        if root_usage <= 0.0 {
            return false;
        }
        let node = &self.nodes[id];
        (node.temp_usage as f64 / root_usage) > node.tree_percentage
    }

    /// The chain of nodes from `id` up to (and including) the root,
    /// ordered root-first, per `create_group_path`.
    pub fn path_to_root(&self, id: FsNodeId) -> Vec<FsNodeId> {
        let mut path = Vec::new();
        let mut cur = Some(id);
        while let Some(n) = cur {
            path.push(n);
            cur = self.nodes[n].parent;
        }
        path.reverse();
        path
    }

    /// `compare_path`: walks two root-first paths from their common root,
    /// and at the first level where they diverge, the path whose node has
    /// the lower `usage_factor` is more deserving (`Ordering::Less`).
    pub fn compare_path(&self, a: &[FsNodeId], b: &[FsNodeId]) -> Ordering {
        for (&na, &nb) in a.iter().zip(b.iter()) {
            if na == nb {
                continue;
            }
            let fa = self.nodes[na].usage_factor;
            let fb = self.nodes[nb].usage_factor;
            return fa.partial_cmp(&fb).unwrap_or(Ordering::Equal);
        }
        a.len().cmp(&b.len())
    }

    /// Deep-duplicates the tree for a throwaway simulation, per
    /// `dup_fairshare_tree`. A plain owned arena makes this `Clone::clone`,
    /// same reasoning as `ServerInfo::clone_for_simulation`.
    pub fn dup_fairshare_tree(&self) -> FairshareTree {
        self.clone()
    }
}

impl Default for FairshareTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> FairshareTree {
        let mut tree = FairshareTree::new();
        tree.add_child("dept_a", None, 10);
        tree.add_child("dept_b", None, 30);
        tree.add_child("alice", Some("dept_a"), 1);
        tree.add_child("bob", Some("dept_a"), 1);
        tree
    }

    #[test]
    fn calc_fair_share_perc_normalizes_by_level() {
        let mut tree = sample_tree();
        tree.calc_fair_share_perc();
        let dept_a = tree.find("dept_a").unwrap();
        let dept_b = tree.find("dept_b").unwrap();
        // dept_a and dept_b share the root with "unknown" (shares=1 default).
        assert!(tree.nodes[dept_b].tree_percentage > tree.nodes[dept_a].tree_percentage);

        let alice = tree.find("alice").unwrap();
        let bob = tree.find("bob").unwrap();
        assert!((tree.nodes[alice].tree_percentage - tree.nodes[bob].tree_percentage).abs() < 1e-9);
    }

    #[test]
    fn unknown_entity_charges_to_unknown_group() {
        let mut tree = sample_tree();
        tree.update_usage_on_run("nobody", 100);
        assert_eq!(tree.nodes[tree.unknown].usage, 101);
        assert_eq!(tree.nodes[tree.root].usage, 101);
    }

    #[test]
    fn usage_run_propagates_to_every_ancestor() {
        let mut tree = sample_tree();
        let alice = tree.find("alice").unwrap();
        tree.update_usage_on_run("alice", 50);
        assert_eq!(tree.nodes[alice].usage, 51);
        assert_eq!(tree.nodes[tree.find("dept_a").unwrap()].usage, 51);
        assert_eq!(tree.nodes[tree.root].usage, 51);
    }

    #[test]
    fn decay_halves_usage_and_floors_at_one() {
        let mut tree = sample_tree();
        tree.update_usage_on_run("alice", 100);
        tree.decay_fairshare_tree(0.5);
        let alice = tree.find("alice").unwrap();
        assert_eq!(tree.nodes[alice].usage, 51);
    }

    #[test]
    fn compare_path_prefers_lower_usage_factor_at_first_divergence() {
        let mut tree = sample_tree();
        tree.calc_fair_share_perc();
        tree.update_usage_on_run("alice", 1000);
        tree.calc_usage_factor();

        let alice_path = tree.path_to_root(tree.find("alice").unwrap());
        let bob_path = tree.path_to_root(tree.find("bob").unwrap());
        assert_eq!(tree.compare_path(&bob_path, &alice_path), Ordering::Less, "bob used less, so bob is more deserving");
    }

    #[test]
    fn dup_fairshare_tree_is_independent_of_original() {
        let mut tree = sample_tree();
        let mut dup = tree.dup_fairshare_tree();
        dup.update_usage_on_run("alice", 500);
        assert_ne!(tree.nodes[tree.find("alice").unwrap()].usage, dup.nodes[dup.find("alice").unwrap()].usage);
    }
}
