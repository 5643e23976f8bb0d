use crate::util::{format_big, print_bounds, print_population, UniverseArgs};
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args, Debug)]
pub(super) struct RunArgs {
    #[command(flatten)]
    universe: UniverseArgs,

    /// Only report the final state
    #[arg(short, long)]
    quiet: bool,
}

pub(super) fn run_run(args: RunArgs) -> Result<()> {
    let timer = std::time::Instant::now();
    let mut universe = args.universe.build()?;
    println!(
        "Loaded pattern of rule {} in {:.1} secs",
        universe.rule(),
        timer.elapsed().as_secs_f64()
    );
    print_population(&universe);

    let timer = std::time::Instant::now();
    for i in 1..=args.universe.count {
        let generation = universe
            .advance()
            .with_context(|| format!("failed to advance at step {i}"))?;
        if !args.quiet || i == args.universe.count {
            println!("Generation: {}", format_big(&generation));
            print_population(&universe);
            print_bounds(&universe);
        }
    }
    println!(
        "Advanced {} times by 2^{} generations in {:.1} secs",
        args.universe.count,
        args.universe.step_log2,
        timer.elapsed().as_secs_f64()
    );
    Ok(())
}
