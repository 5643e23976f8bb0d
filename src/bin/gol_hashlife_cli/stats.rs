use crate::util::{format_big, print_population, UniverseArgs};
use anyhow::{Context, Result};
use clap::Args;
use gol_hashlife::Universe;

#[derive(Args, Debug)]
pub(super) struct StatsArgs {
    #[command(flatten)]
    universe: UniverseArgs,

    /// Collect garbage before reporting
    #[arg(long)]
    gc: bool,
}

pub(super) fn run_stats(args: StatsArgs) -> Result<()> {
    let timer = std::time::Instant::now();
    let mut universe = args.universe.build()?;
    for _ in 0..args.universe.count {
        universe.advance().context("failed to advance")?;
    }
    if args.gc {
        universe.run_gc();
    }
    println!("Generation: {}", format_big(universe.generation()));
    print_population(&universe);
    print_store(&universe);
    print_distribution(&universe);
    println!(
        "Computed stats in {:.1} secs",
        timer.elapsed().as_secs_f64()
    );
    Ok(())
}

fn print_store(universe: &Universe) {
    println!(
        "Nodes: {} of at most {}",
        universe.node_count(),
        universe.node_limit()
    );
    println!(
        "Table: capacity {}, load {:.3}",
        universe.table_capacity(),
        universe.table_load()
    );
    println!("Memory: {:.1} MiB", universe.bytes_total() as f64 / (1 << 20) as f64);
}

fn print_distribution(universe: &Universe) {
    let distribution = universe.level_distribution();
    println!("Distribution of node sizes (side lengths of the squares):");
    let nodes_total = distribution.iter().map(|&x| x as u64).sum::<u64>();
    println!("total -> {nodes_total}");
    for (i, &x) in distribution.iter().enumerate() {
        let percent = x as u64 * 100 / nodes_total;
        if percent == 0 {
            continue;
        }
        println!("2^{:<4}->{:>3}%", i, percent);
    }
}
