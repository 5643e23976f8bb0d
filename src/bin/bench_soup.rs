use gol_hashlife::*;

fn main() -> anyhow::Result<()> {
    // advancing a dense random soup by growing powers of two
    let (xs, ys) = soup::random_cells(8, 0.5, Some(42))?;
    let mut universe = Universe::with_config(UniverseConfig::with_mem_limit_mib(4 << 10))?;

    for step_log2 in 0..=12 {
        universe.load_field(&xs, &ys, None)?;
        universe.set_step_exponent(step_log2);

        let timer = std::time::Instant::now();
        universe.advance()?;
        let elapsed = timer.elapsed();
        println!(
            "{} -> {:?}\tpopulation={}\tnodes={}",
            step_log2,
            elapsed.as_secs_f64(),
            universe.population(),
            universe.node_count()
        );
        if elapsed.as_secs_f64() > 60.0 {
            break;
        }
    }
    Ok(())
}
