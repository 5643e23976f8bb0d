use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use gol_hashlife::{soup, BigInt, Bounds, Rule, Universe, UniverseConfig, DEFAULT_MEM_LIMIT_MIB};
use num_format::{CustomFormat, Grouping, ToFormattedString};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(super) enum Named {
    /// Period 2 oscillator
    Blinker,
    /// See https://conwaylife.com/wiki/Glider
    Glider,
    /// Methuselah stabilizing after 1103 generations
    RPentomino,
    /// Methuselah stabilizing after 5206 generations
    Acorn,
}

impl Named {
    fn cells(self) -> &'static [(i64, i64)] {
        match self {
            Named::Blinker => &[(0, 0), (1, 0), (2, 0)],
            Named::Glider => &[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)],
            Named::RPentomino => &[(1, 0), (2, 0), (0, 1), (1, 1), (1, 2)],
            Named::Acorn => &[(1, 0), (3, 1), (0, 2), (1, 2), (4, 2), (5, 2), (6, 2)],
        }
    }
}

/// Pattern and engine settings shared by all subcommands.
#[derive(Args, Debug)]
pub(super) struct UniverseArgs {
    /// Well-known pattern to start from
    #[arg(short, long, value_enum, conflicts_with = "soup_log2")]
    pattern: Option<Named>,

    /// Start from a random square soup with side 2^soup_log2 instead
    #[arg(long)]
    soup_log2: Option<u32>,

    /// Probability of a soup cell to be alive
    #[arg(long, default_value_t = 0.5)]
    density: f64,

    /// Seed of the soup; random by default
    #[arg(long)]
    seed: Option<u64>,

    /// Rulestring such as B3/S23
    #[arg(short, long, default_value = "B3/S23")]
    rule: String,

    /// Maximum memory (in MiB) allocated to the node store
    #[arg(short, long, default_value_t = DEFAULT_MEM_LIMIT_MIB)]
    mem_limit_mib: u32,

    /// Every step advances the pattern by 2^step_log2 generations
    #[arg(short, long, default_value_t = 0)]
    pub(super) step_log2: u32,

    /// Number of steps
    #[arg(short, long, default_value_t = 1)]
    pub(super) count: u64,
}

impl UniverseArgs {
    /// Creates the universe and loads the requested pattern.
    pub(super) fn build(&self) -> Result<Universe> {
        let rule: Rule = self
            .rule
            .parse()
            .with_context(|| format!("bad rule {:?}", self.rule))?;
        let config = UniverseConfig::with_mem_limit_mib(self.mem_limit_mib)
            .with_rule(rule)
            .with_step_log2(self.step_log2);
        let mut universe = Universe::with_config(config).context("failed to create universe")?;

        let (xs, ys) = match (self.pattern, self.soup_log2) {
            (_, Some(side_log2)) => soup::random_cells(side_log2, self.density, self.seed)?,
            (named, None) => named.unwrap_or(Named::RPentomino).cells().iter().copied().unzip(),
        };
        let bounds = Bounds::of_cells(&xs, &ys);
        universe
            .load_field(&xs, &ys, bounds.as_ref())
            .context("failed to load pattern")?;
        Ok(universe)
    }
}

pub(super) fn format_big(value: &BigInt) -> String {
    let fmt = CustomFormat::builder()
        .grouping(Grouping::Standard)
        .separator("_")
        .build()
        .unwrap();
    value.to_formatted_string(&fmt)
}

pub(super) fn print_population(universe: &Universe) {
    println!("Population: {}", format_big(universe.population()));
}

pub(super) fn print_bounds(universe: &Universe) {
    let b = universe.root_bounds();
    println!(
        "Bounds: x {}..={}, y {}..={} ({} x {})",
        b.left,
        b.right,
        b.top,
        b.bottom,
        format_big(&b.width()),
        format_big(&b.height())
    );
}
