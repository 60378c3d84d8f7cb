use std::collections::HashMap;
use std::sync::Arc;

/// The value kind a resource definition carries. Distinct from
/// `ResourceValue`'s variants because `Infinity`/`Unset` are states a value
/// can be in regardless of kind, not kinds themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Long,
    Size,
    Str,
    StrArray,
    Bool,
    Float,
}

/// Flags carried on a resource definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceFlags {
    /// Arithmetic combines (add/subtract) are meaningful for this resource.
    pub consumable: bool,
    /// Summed across allocated nodes at the node/host level.
    pub host: bool,
    /// Aggregated into job-wide usage (`rassn`: resources assigned).
    pub rassn: bool,
    pub boolean: bool,
    /// Influences `select`-string matching (placement-set signature).
    pub cvtslt: bool,
}

/// `(name, type, flags)`: a process-wide resource definition. All
/// comparisons in the scheduler compare `Arc<ResourceDef>` pointers (via
/// `Arc::ptr_eq`), never names, once a resource list has been resolved
/// against the registry.
#[derive(Debug)]
pub struct ResourceDef {
    pub name: String,
    pub kind: ResourceKind,
    pub flags: ResourceFlags,
}

impl ResourceDef {
    pub fn new(name: impl Into<String>, kind: ResourceKind, flags: ResourceFlags) -> Arc<Self> {
        Arc::new(ResourceDef { name: name.into(), kind, flags })
    }
}

impl PartialEq for ResourceDef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
impl Eq for ResourceDef {}

lazy_static::lazy_static! {
    /// Built-in resource definitions every scheduler instance ships with,
    /// independent of whatever the server reports via `query_resources`.
    /// These are immutable process constants, not the per-reload mutable
    /// state `SchedulerContext` owns (see `src/context.rs`).
    pub static ref BUILTIN_DEFS: Vec<(&'static str, ResourceKind, ResourceFlags)> = vec![
        ("ncpus", ResourceKind::Long, ResourceFlags { consumable: true, host: true, rassn: true, ..Default::default() }),
        ("mem", ResourceKind::Size, ResourceFlags { consumable: true, host: true, rassn: true, ..Default::default() }),
        ("vmem", ResourceKind::Size, ResourceFlags { consumable: true, host: true, rassn: true, ..Default::default() }),
        ("ngpus", ResourceKind::Long, ResourceFlags { consumable: true, host: true, rassn: true, ..Default::default() }),
        ("walltime", ResourceKind::Size, ResourceFlags { consumable: true, ..Default::default() }),
        ("cput", ResourceKind::Size, ResourceFlags { consumable: true, ..Default::default() }),
        ("host", ResourceKind::Str, ResourceFlags { cvtslt: true, ..Default::default() }),
        ("vnode", ResourceKind::Str, ResourceFlags::default()),
        ("switch", ResourceKind::Str, ResourceFlags { cvtslt: true, ..Default::default() }),
        ("aoe", ResourceKind::Str, ResourceFlags::default()),
        ("arch", ResourceKind::Str, ResourceFlags::default()),
        ("license", ResourceKind::Long, ResourceFlags { consumable: true, ..Default::default() }),
    ];
}

/// Registry mapping `name -> Arc<ResourceDef>`. Owned by `SchedulerContext`,
/// built once per config reload, never mutated mid-cycle.
#[derive(Debug, Default)]
pub struct ResourceDefRegistry {
    by_name: HashMap<String, Arc<ResourceDef>>,
}

impl ResourceDefRegistry {
    pub fn new() -> Self {
        let mut reg = ResourceDefRegistry::default();
        for (name, kind, flags) in BUILTIN_DEFS.iter() {
            reg.register(name, *kind, *flags);
        }
        reg
    }

    pub fn register(&mut self, name: &str, kind: ResourceKind, flags: ResourceFlags) -> Arc<ResourceDef> {
        let def = ResourceDef::new(name, kind, flags);
        self.by_name.insert(name.to_string(), def.clone());
        def
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceDef>> {
        self.by_name.get(name).cloned()
    }

    pub fn get_or_register_generic(&mut self, name: &str) -> Arc<ResourceDef> {
        if let Some(def) = self.get(name) {
            return def;
        }
        // Unknown resources reported by a `server_dyn_res` line default to a
        // consumable long, the most common case for site-custom resources.
        self.register(name, ResourceKind::Long, ResourceFlags { consumable: true, ..Default::default() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_resolves_ncpus_as_consumable() {
        let reg = ResourceDefRegistry::new();
        let def = reg.get("ncpus").unwrap();
        assert!(def.flags.consumable);
        assert!(def.flags.host);
    }

    #[test]
    fn unknown_resource_gets_generic_consumable_def() {
        let mut reg = ResourceDefRegistry::new();
        let def = reg.get_or_register_generic("gpu_model_xyz");
        assert!(def.flags.consumable);
        assert!(reg.get("gpu_model_xyz").is_some());
    }
}
