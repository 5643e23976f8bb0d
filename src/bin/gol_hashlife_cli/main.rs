mod run;
mod stats;
mod util;

use clap::{Parser, Subcommand};
use run::{run_run, RunArgs};
use stats::{run_stats, StatsArgs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about)]
struct CLIParser {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Advance a pattern and report generation, population and bounds after every step
    Run(RunArgs),
    /// Advance a pattern and report the state of the node store and the distribution of node levels
    Stats(StatsArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gol_hashlife=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CLIParser::parse();

    match args.action {
        Action::Run(args) => run_run(args),
        Action::Stats(args) => run_stats(args),
    }
}
