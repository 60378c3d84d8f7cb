//! `pbsfs`: the fairshare inspection/maintenance CLI. Operates directly
//! on the resource-group file and usage file named by `sched_config` (or
//! overridden on the command line), the same files the scheduler core
//! itself reads and writes each cycle.

use clap::Parser;
use sched_core::config::SchedConfig;
use sched_core::fairshare::{parse_group, read_usage, write_usage, FairshareTree};
use sched_core::logger;

#[derive(Parser, Debug)]
#[command(name = "pbsfs", about = "Inspect and maintain scheduler fairshare state")]
struct Args {
    /// Path to `sched_config`, used to locate the resource-group and usage
    /// files when `--resource-group`/`--usage-file` aren't given.
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    resource_group: Option<String>,

    #[arg(long)]
    usage_file: Option<String>,

    /// Target a non-default scheduler instance's fairshare state.
    #[arg(short = 'I', long = "instance")]
    instance: Option<String>,

    /// Print the tree, one entity per line.
    #[arg(short = 'p')]
    print_flat: bool,

    /// Print the tree hierarchically, indented by depth.
    #[arg(short = 't')]
    print_tree: bool,

    /// Apply one decay step and persist it.
    #[arg(short = 'd')]
    decay: bool,

    /// Show one entity's detail.
    #[arg(short = 'g', value_name = "ENTITY")]
    get_entity: Option<String>,

    /// Set one entity's usage.
    #[arg(short = 's', value_names = ["ENTITY", "USAGE"], num_args = 2)]
    set_usage: Option<Vec<String>>,

    /// Compare two entities' fairshare paths.
    #[arg(short = 'c', value_names = ["ENTITY1", "ENTITY2"], num_args = 2)]
    compare: Option<Vec<String>>,

    /// Trim the usage file down to entities still in the resource-group file.
    #[arg(short = 'e')]
    trim: bool,
}

fn load_tree(args: &Args) -> sched_core::error::Result<(FairshareTree, std::path::PathBuf)> {
    let config = match &args.config {
        Some(path) => Some(sched_core::config::parse_config(path)?),
        None => None,
    };

    let suffix = args.instance.as_deref().map(|n| format!("_{n}")).unwrap_or_default();

    let resgroup_path = args
        .resource_group
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.resource_group_file.clone()))
        .unwrap_or_else(|| format!("resource_group{suffix}"));

    let usage_path = args
        .usage_file
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.usage_file.clone()))
        .unwrap_or_else(|| format!("usage{suffix}"));

    let mut tree = parse_group(&resgroup_path)?;
    let usage_path = std::path::PathBuf::from(usage_path);
    if usage_path.exists() {
        read_usage(&usage_path, &mut tree)?;
    }
    tree.calc_fair_share_perc();
    tree.calc_usage_factor();

    Ok((tree, usage_path))
}

fn print_flat(tree: &FairshareTree) {
    for node in tree.nodes.values() {
        println!("{} usage={} shares={} pct={:.6}", node.name, node.usage, node.shares, node.tree_percentage);
    }
}

fn print_hierarchical(tree: &FairshareTree) {
    fn walk(tree: &FairshareTree, id: sched_core::fairshare::FsNodeId, depth: usize) {
        let node = &tree.nodes[id];
        println!("{}{} (usage={}, pct={:.6})", "  ".repeat(depth), node.name, node.usage, node.tree_percentage);
        for &child in &node.children {
            walk(tree, child, depth + 1);
        }
    }
    walk(tree, tree.root, 0);
}

fn run(args: Args) -> sched_core::error::Result<()> {
    let (mut tree, usage_path) = load_tree(&args)?;

    if args.print_flat {
        print_flat(&tree);
    }

    if args.print_tree {
        print_hierarchical(&tree);
    }

    if args.decay {
        let config = match &args.config {
            Some(path) => sched_core::config::parse_config(path)?,
            None => SchedConfig::default(),
        };
        tree.decay_fairshare_tree(config.fairshare_decay_factor);
        write_usage(&usage_path, &tree)?;
        println!("decayed usage by factor {} and persisted to {}", config.fairshare_decay_factor, usage_path.display());
    }

    if let Some(entity) = &args.get_entity {
        match tree.find(entity) {
            Some(id) => {
                let node = &tree.nodes[id];
                println!(
                    "{}: usage={} shares={} tree_pct={:.6} usage_factor={:.6}",
                    node.name, node.usage, node.shares, node.tree_percentage, node.usage_factor
                );
            }
            None => {
                log::error!("unknown entity: {}", entity);
                return Err(sched_core::error::Error::UnknownResourceDef(entity.clone()));
            }
        }
    }

    if let Some(pair) = &args.set_usage {
        let (entity, usage_str) = (&pair[0], &pair[1]);
        let usage: u64 = usage_str.parse().map_err(|_| sched_core::error::Error::BadResourceValue {
            name: entity.clone(),
            value: usage_str.clone(),
        })?;
        let id = tree.find(entity).ok_or_else(|| sched_core::error::Error::UnknownResourceDef(entity.clone()))?;
        tree.nodes[id].usage = usage;
        tree.nodes[id].temp_usage = usage;
        write_usage(&usage_path, &tree)?;
        println!("set {} usage to {}", entity, usage);
    }

    if let Some(pair) = &args.compare {
        let (e1, e2) = (&pair[0], &pair[1]);
        let id1 = tree.find(e1).ok_or_else(|| sched_core::error::Error::UnknownResourceDef(e1.clone()))?;
        let id2 = tree.find(e2).ok_or_else(|| sched_core::error::Error::UnknownResourceDef(e2.clone()))?;
        let path1 = tree.path_to_root(id1);
        let path2 = tree.path_to_root(id2);
        match tree.compare_path(&path1, &path2) {
            std::cmp::Ordering::Less => println!("{} is more deserving than {}", e1, e2),
            std::cmp::Ordering::Greater => println!("{} is more deserving than {}", e2, e1),
            std::cmp::Ordering::Equal => println!("{} and {} are equally deserving", e1, e2),
        }
    }

    if args.trim {
        write_usage(&usage_path, &tree)?;
        println!("trimmed usage file to entities present in the resource-group file");
    }

    Ok(())
}

fn main() {
    logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        log::error!("{}", e);
        eprintln!("pbsfs: {}", e);
        std::process::exit(1);
    }
}
