use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// When `provision_policy` requires a node to be re-imaged before a job can
/// start, this governs whether the scheduler tries it at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvisionPolicy {
    #[default]
    Avoid,
    Aggressive,
}

/// `smp_cluster_dist`: how chunks are spread across a single SMP host when
/// the general node selector can choose more than one placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmpClusterDist {
    #[default]
    Pack,
    RoundRobin,
    LowestLoad,
}

/// Parsed `sched_config`: a line-oriented key-value file. Recognized
/// keys are promoted to typed fields; anything else is kept verbatim in
/// `raw` so a caller that needs a not-yet-modeled option can still read it.
#[derive(Debug, Clone)]
pub struct SchedConfig {
    pub round_robin: bool,
    pub by_queue: bool,
    pub strict_ordering: bool,
    pub strict_fifo: bool,
    pub fair_share: bool,
    pub help_starving_jobs: bool,
    pub max_starve: Option<Duration>,
    pub backfill: bool,
    pub backfill_prime: bool,
    pub prime_spill: Option<Duration>,
    pub dedicated_prefix: Option<String>,
    pub preemptive_sched: bool,
    pub preempt_prio: Vec<String>,
    pub preempt_order: Vec<char>,
    pub preempt_queue_prio: Option<i64>,
    pub job_sort_key: Option<String>,
    pub node_sort_key: Option<String>,
    pub node_group_key: Option<String>,
    pub provision_policy: ProvisionPolicy,
    pub server_dyn_res: Vec<(String, String)>,
    pub peer_queue: Vec<String>,
    pub smp_cluster_dist: SmpClusterDist,
    pub fairshare_usage_res: String,
    pub fairshare_entity: String,
    pub fairshare_decay_factor: f64,
    pub fairshare_decay_time: Duration,
    pub unknown_shares: u32,
    pub log_filter: Option<String>,
    pub dedicated_time_file: Option<String>,
    pub holidays_file: Option<String>,
    pub resource_group_file: Option<String>,
    pub usage_file: Option<String>,
    pub per_share_topjobs: u32,
    pub per_queues_topjobs: u32,
    pub only_explicit_psets: bool,
    pub do_not_span_psets: bool,
    pub preempt_sort_min_time_since_start: bool,
    pub raw: HashMap<String, String>,
}

impl Default for SchedConfig {
    fn default() -> Self {
        SchedConfig {
            round_robin: false,
            by_queue: true,
            strict_ordering: false,
            strict_fifo: false,
            fair_share: false,
            help_starving_jobs: false,
            max_starve: None,
            backfill: true,
            backfill_prime: false,
            prime_spill: None,
            dedicated_prefix: None,
            preemptive_sched: false,
            preempt_prio: Vec::new(),
            preempt_order: vec!['S', 'C', 'R'],
            preempt_queue_prio: None,
            job_sort_key: None,
            node_sort_key: None,
            node_group_key: None,
            provision_policy: ProvisionPolicy::default(),
            server_dyn_res: Vec::new(),
            peer_queue: Vec::new(),
            smp_cluster_dist: SmpClusterDist::default(),
            fairshare_usage_res: "cput".to_string(),
            fairshare_entity: "euser".to_string(),
            fairshare_decay_factor: 0.5,
            fairshare_decay_time: Duration::from_secs(86400),
            unknown_shares: 10,
            log_filter: None,
            dedicated_time_file: None,
            holidays_file: None,
            resource_group_file: None,
            usage_file: None,
            per_share_topjobs: 0,
            per_queues_topjobs: 0,
            only_explicit_psets: false,
            do_not_span_psets: false,
            preempt_sort_min_time_since_start: false,
            raw: HashMap::new(),
        }
    }
}

/// Parses a duration written as `HH:MM:SS` (the format PBS uses for
/// `max_starve`/`prime_spill`/`fairshare_decay_time`), falling back to a
/// bare seconds count.
fn parse_duration(s: &str) -> Option<Duration> {
    let parts: Vec<&str> = s.split(':').collect();
    let secs: u64 = match parts.as_slice() {
        [h, m, s] => h.parse::<u64>().ok()? * 3600 + m.parse::<u64>().ok()? * 60 + s.parse::<u64>().ok()?,
        [m, s] => m.parse::<u64>().ok()? * 60 + s.parse::<u64>().ok()?,
        [s] => s.parse().ok()?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

fn parse_bool_token(s: &str) -> bool {
    matches!(s.trim(), "true" | "True" | "1")
}

pub fn parse_config(path: impl AsRef<Path>) -> Result<SchedConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    parse_config_str(&contents)
}

/// Parses `sched_config` content already read into memory, separated out
/// so tests don't need a temp file for every option.
pub fn parse_config_str(contents: &str) -> Result<SchedConfig> {
    let mut cfg = SchedConfig::default();

    for (lineno, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let value = rest.trim().trim_end_matches(|c| c == '\t').to_string();
        let value_unquoted = value.trim_matches('"').to_string();

        match key {
            "round_robin" => cfg.round_robin = parse_bool_token(value.split_whitespace().next().unwrap_or("false")),
            "by_queue" => cfg.by_queue = parse_bool_token(&value),
            "strict_ordering" => cfg.strict_ordering = parse_bool_token(&value),
            "strict_fifo" => cfg.strict_fifo = parse_bool_token(&value),
            "fair_share" => cfg.fair_share = parse_bool_token(&value),
            "help_starving_jobs" => cfg.help_starving_jobs = parse_bool_token(&value),
            "max_starve" => cfg.max_starve = parse_duration(&value),
            "backfill" => cfg.backfill = parse_bool_token(&value),
            "backfill_prime" => cfg.backfill_prime = parse_bool_token(&value),
            "prime_spill" => cfg.prime_spill = parse_duration(&value),
            "dedicated_prefix" => cfg.dedicated_prefix = Some(value_unquoted),
            "preemptive_sched" => cfg.preemptive_sched = parse_bool_token(&value),
            "preempt_prio" => cfg.preempt_prio = value_unquoted.split('+').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            "preempt_order" => cfg.preempt_order = value_unquoted.chars().filter(|c| !c.is_whitespace()).collect(),
            "preempt_queue_prio" => cfg.preempt_queue_prio = value.parse().ok(),
            "job_sort_key" => cfg.job_sort_key = Some(value_unquoted),
            "node_sort_key" => cfg.node_sort_key = Some(value_unquoted),
            "node_group_key" => cfg.node_group_key = Some(value_unquoted),
            "provision_policy" => {
                cfg.provision_policy = if value.trim() == "aggressive" { ProvisionPolicy::Aggressive } else { ProvisionPolicy::Avoid }
            }
            "server_dyn_res" => {
                if let Some((name, cmd)) = value_unquoted.split_once('!') {
                    cfg.server_dyn_res.push((name.trim().to_string(), cmd.trim().to_string()));
                }
            }
            "peer_queue" => cfg.peer_queue.push(value_unquoted),
            "smp_cluster_dist" => {
                cfg.smp_cluster_dist = match value.trim() {
                    "round_robin" => SmpClusterDist::RoundRobin,
                    "lowest_load" => SmpClusterDist::LowestLoad,
                    _ => SmpClusterDist::Pack,
                }
            }
            "fairshare_usage_res" => cfg.fairshare_usage_res = value_unquoted,
            "fairshare_entity" => cfg.fairshare_entity = value_unquoted,
            "fairshare_decay_factor" => {
                cfg.fairshare_decay_factor =
                    value.parse().map_err(|_| Error::SchedConfig { line: lineno + 1, reason: format!("bad fairshare_decay_factor: {value}") })?
            }
            "fairshare_decay_time" => {
                cfg.fairshare_decay_time = parse_duration(&value)
                    .ok_or_else(|| Error::SchedConfig { line: lineno + 1, reason: format!("bad fairshare_decay_time: {value}") })?
            }
            "unknown_shares" => cfg.unknown_shares = value.parse().unwrap_or(cfg.unknown_shares),
            "log_filter" => cfg.log_filter = Some(value_unquoted),
            "dedicated_time_file" => cfg.dedicated_time_file = Some(value_unquoted),
            "holidays_file" => cfg.holidays_file = Some(value_unquoted),
            "resource_group_file" => cfg.resource_group_file = Some(value_unquoted),
            "usage_file" => cfg.usage_file = Some(value_unquoted),
            "per_share_topjobs" => cfg.per_share_topjobs = value.parse().unwrap_or(0),
            "per_queues_topjobs" => cfg.per_queues_topjobs = value.parse().unwrap_or(0),
            "only_explicit_psets" => cfg.only_explicit_psets = parse_bool_token(&value),
            "do_not_span_psets" => cfg.do_not_span_psets = parse_bool_token(&value),
            "preempt_sort" => cfg.preempt_sort_min_time_since_start = value.trim() == "min_time_since_start",
            _ => {
                cfg.raw.insert(key.to_string(), value);
            }
        }
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_keys_populate_typed_fields() {
        let src = "strict_ordering true\nbackfill true\nfairshare_decay_factor 0.75\nfairshare_decay_time 24:00:00\n";
        let cfg = parse_config_str(src).unwrap();
        assert!(cfg.strict_ordering);
        assert!(cfg.backfill);
        assert_eq!(cfg.fairshare_decay_factor, 0.75);
        assert_eq!(cfg.fairshare_decay_time, Duration::from_secs(86400));
    }

    #[test]
    fn unrecognized_keys_land_in_raw() {
        let cfg = parse_config_str("some_future_option value123\n").unwrap();
        assert_eq!(cfg.raw.get("some_future_option"), Some(&"value123".to_string()));
    }

    #[test]
    fn preempt_order_parses_method_letters() {
        let cfg = parse_config_str("preempt_order \"SCR\"\n").unwrap();
        assert_eq!(cfg.preempt_order, vec!['S', 'C', 'R']);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let cfg = parse_config_str("# a comment\n\nbackfill false\n").unwrap();
        assert!(!cfg.backfill);
    }
}
