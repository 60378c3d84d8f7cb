use sched_core::context::SchedulerContext;
use sched_core::cycle::{run_cycle, CycleConfig, RunAction};
use sched_core::entity::RankAllocator;
use sched_core::logger;
use sched_core::snapshot::load_snapshot;
use clap::Parser;

/// Runs a single scheduling cycle against a snapshot file and prints a
/// one-line summary of what happened: load, process, print a summary.
#[derive(Parser, Debug)]
#[command(name = "sched_core", about = "Runs one scheduling cycle against a snapshot")]
struct Args {
    /// Path to the snapshot JSON describing the server/queue/node/job universe.
    #[arg(long)]
    snapshot: String,

    /// Path to `sched_config`. Falls back to built-in defaults when omitted.
    #[arg(long)]
    config: Option<String>,
}

fn main() {
    logger::init();

    let args = Args::parse();

    let mut ctx = match &args.config {
        Some(path) => match SchedulerContext::load(path) {
            Ok(ctx) => ctx,
            Err(e) => {
                log::error!("Failed to load config '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => SchedulerContext::minimal(),
    };

    let ranks = RankAllocator::new();
    let mut sinfo = match load_snapshot(&args.snapshot, &mut ctx.resource_defs, &ranks) {
        Ok(sinfo) => sinfo,
        Err(e) => {
            log::error!("Failed to load snapshot '{}': {}", args.snapshot, e);
            std::process::exit(1);
        }
    };

    ctx.fairshare.calc_fair_share_perc();
    ctx.fairshare.calc_usage_factor();

    let mut cycle_cfg = CycleConfig::from_config(&ctx.config);
    cycle_cfg.dedtime_windows = ctx.dedicated_windows.iter().map(|w| (w.start, w.end)).collect();

    let actions = run_cycle(&mut ctx, &mut sinfo, &cycle_cfg);

    let mut run = 0;
    let mut calendared = 0;
    let mut preempted = 0;
    let mut blocked = 0;
    for action in &actions {
        match action {
            RunAction::Run { .. } => run += 1,
            RunAction::Calendared { .. } => calendared += 1,
            RunAction::Preempted { .. } => preempted += 1,
            RunAction::Blocked { .. } => blocked += 1,
        }
    }

    log::info!("Cycle complete: {} run, {} calendared, {} preempted, {} blocked", run, calendared, preempted, blocked);
    println!("{} run, {} calendared, {} preempted, {} blocked", run, calendared, preempted, blocked);

    if let Err(e) = ctx.persist_fairshare() {
        log::warn!("Failed to persist fairshare usage: {}", e);
    }
}
