use super::def::ResourceDef;
use super::value::ResourceValue;
use crate::entity::ids::NodeId;
use std::collections::HashMap;
use std::sync::Arc;

/// A resource's `available` amount is usually a value local to the entity,
/// but vnodes of one host may share a physical resource (e.g. `mem` shared
/// between sibling vnodes); in that case `available` is an indirect
/// reference to another node's resource entry instead of a literal value.
#[derive(Debug, Clone)]
pub enum Availability {
    Direct(ResourceValue),
    Indirect(NodeId),
}

/// One `(def, available, assigned, string_value)` entry.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub def: Arc<ResourceDef>,
    pub available: Availability,
    pub assigned: ResourceValue,
    /// Raw string form as received on the wire, kept for resources whose
    /// encoded form isn't fully reconstructable from the typed value alone
    /// (e.g. a `select`-string literal attached to a resource for echo-back).
    pub string_value: Option<String>,
}

impl ResourceEntry {
    pub fn new(def: Arc<ResourceDef>, available: ResourceValue) -> Self {
        ResourceEntry { def, available: Availability::Direct(available), assigned: ResourceValue::Long(0), string_value: None }
    }
}

/// Ordered list of resource entries. Implemented as an ordered `Vec` plus a
/// name index so attribute lists round-trip in the order the wire protocol
/// expects while still supporting O(1) lookup.
#[derive(Debug, Clone, Default)]
pub struct ResourceList {
    entries: Vec<ResourceEntry>,
    index: HashMap<String, usize>,
}

impl ResourceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ResourceEntry) {
        let name = entry.def.name.clone();
        if let Some(&i) = self.index.get(&name) {
            self.entries[i] = entry;
        } else {
            self.index.insert(name, self.entries.len());
            self.entries.push(entry);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResourceEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ResourceEntry> {
        if let Some(&i) = self.index.get(name) { Some(&mut self.entries[i]) } else { None }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ResourceEntry> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves an `available` amount, following one level of `Indirect`
    /// reference via the supplied lookup (typically the owning node arena).
    pub fn available_of(&self, name: &str, resolve_indirect: impl Fn(NodeId) -> Option<ResourceValue>) -> Option<ResourceValue> {
        let entry = self.get(name)?;
        match &entry.available {
            Availability::Direct(v) => Some(v.clone()),
            Availability::Indirect(node_id) => resolve_indirect(*node_id),
        }
    }

    /// How much of `name` remains unused: `available - assigned`, for
    /// consumable resources. Non-consumable resources have no meaningful
    /// "unused" quantity and return `None`.
    pub fn unused(&self, name: &str) -> Option<ResourceValue> {
        let entry = self.get(name)?;
        if !entry.def.flags.consumable {
            return None;
        }
        let Availability::Direct(avail) = &entry.available else { return None };
        avail.subtract(&entry.assigned).ok()
    }
}
