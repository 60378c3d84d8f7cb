//! The explicit `SchedulerContext` struct that replaces process-wide
//! globals with a value built once per config reload, passed by reference
//! into every entry point, and never mutated mid-cycle.

use crate::config::{DedicatedWindow, HolidaysFile, SchedConfig};
use crate::entity::RankAllocator;
use crate::error::Result;
use crate::fairshare::FairshareTree;
use crate::resource::ResourceDefRegistry;
use std::path::{Path, PathBuf};

/// Everything a cycle needs that outlives any single snapshot: the parsed
/// config, resource definitions, the fairshare tree, dedicated-time
/// windows/holidays, and the rank allocator that stamps stable identity on
/// newly-loaded entities.
pub struct SchedulerContext {
    pub config: SchedConfig,
    pub resource_defs: ResourceDefRegistry,
    pub fairshare: FairshareTree,
    pub holidays: Option<HolidaysFile>,
    pub dedicated_windows: Vec<DedicatedWindow>,
    pub rank_alloc: RankAllocator,
    usage_file_path: Option<PathBuf>,
}

impl SchedulerContext {
    /// Loads config, resource-group, holidays, dedicated-time and usage
    /// files named by `config_path`'s `sched_config`. Missing optional
    /// files (holidays, dedicated-time, usage) are tolerated; a missing
    /// `sched_config` is not.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let config = crate::config::parse_config(config_path)?;

        let mut fairshare = match &config.resource_group_file {
            Some(path) => crate::fairshare::parse_group(path)?,
            None => FairshareTree::new(),
        };

        let usage_file_path = config.usage_file.as_ref().map(PathBuf::from);
        if let Some(path) = &usage_file_path {
            if path.exists() {
                crate::fairshare::read_usage(path, &mut fairshare)?;
            }
        }

        let holidays = match &config.holidays_file {
            Some(path) if Path::new(path).exists() => Some(crate::config::parse_holidays(path)?),
            _ => None,
        };

        let dedicated_windows = match &config.dedicated_time_file {
            Some(path) if Path::new(path).exists() => crate::config::parse_dedicated_time(path)?,
            _ => Vec::new(),
        };

        Ok(SchedulerContext {
            config,
            resource_defs: ResourceDefRegistry::new(),
            fairshare,
            holidays,
            dedicated_windows,
            rank_alloc: RankAllocator::new(),
            usage_file_path,
        })
    }

    /// Constructs a minimal context with built-in defaults and no files on
    /// disk, for callers (tests, `pbsfs` without `-I`) that don't need a
    /// full `sched_config` reload.
    pub fn minimal() -> Self {
        SchedulerContext {
            config: SchedConfig::default(),
            resource_defs: ResourceDefRegistry::new(),
            fairshare: FairshareTree::new(),
            holidays: None,
            dedicated_windows: Vec::new(),
            rank_alloc: RankAllocator::new(),
            usage_file_path: None,
        }
    }

    /// Persists the current fairshare tree to the configured usage file, if
    /// one is set. Called at the end of a cycle.
    pub fn persist_fairshare(&self) -> Result<()> {
        if let Some(path) = &self.usage_file_path {
            crate::fairshare::write_usage(path, &self.fairshare)?;
        }
        Ok(())
    }

    pub fn usage_file_path(&self) -> Option<&Path> {
        self.usage_file_path.as_deref()
    }

    pub fn set_usage_file_path(&mut self, path: impl Into<PathBuf>) {
        self.usage_file_path = Some(path.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn minimal_context_has_builtin_resource_defs_and_empty_fairshare() {
        let ctx = SchedulerContext::minimal();
        assert!(ctx.resource_defs.get("ncpus").is_some());
        assert!(ctx.fairshare.find("root").is_some());
    }

    #[test]
    fn load_reads_sched_config_and_resource_group_file() {
        let dir = std::env::temp_dir().join(format!("sched_core_ctx_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let resgroup_path = dir.join("resource_group");
        fs::write(&resgroup_path, "dept_a 10\n").unwrap();

        let config_path = dir.join("sched_config");
        fs::write(&config_path, format!("backfill true\nresource_group_file {}\n", resgroup_path.display())).unwrap();

        let ctx = SchedulerContext::load(&config_path).unwrap();
        assert!(ctx.config.backfill);
        assert!(ctx.fairshare.find("dept_a").is_some());

        fs::remove_dir_all(&dir).ok();
    }
}
