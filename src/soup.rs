//! Random soups: square patterns filled with live cells at a given density.

use anyhow::{anyhow, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Cells of a random `2^side_log2 x 2^side_log2` soup centered on the origin,
/// as coordinate lists ready for [`crate::Universe::load_field`].
///
/// Every cell is alive with probability `density`. The same `seed` always
/// produces the same soup; without a seed the generator is seeded from the OS.
///
/// # Errors
///
/// Returns an error if `density` is not within `0..=1` or `side_log2` is too
/// large for the soup to be held in memory.
///
/// # Example
///
/// ```rust
/// let (xs, ys) = gol_hashlife::soup::random_cells(4, 0.5, Some(42)).unwrap();
/// assert_eq!(xs.len(), ys.len());
/// assert!(xs.iter().chain(&ys).all(|v| (-8..8).contains(v)));
/// ```
pub fn random_cells(side_log2: u32, density: f64, seed: Option<u64>) -> Result<(Vec<i64>, Vec<i64>)> {
    if !(0.0..=1.0).contains(&density) {
        return Err(anyhow!("density {} is not a probability", density));
    }
    if side_log2 >= 32 || 1usize.checked_shl(side_log2 * 2).is_none() {
        return Err(anyhow!("side_log2 {} is too large", side_log2));
    }
    let mut rng = if let Some(x) = seed {
        ChaCha8Rng::seed_from_u64(x)
    } else {
        ChaCha8Rng::from_os_rng()
    };

    let side = 1i64 << side_log2;
    let (mut xs, mut ys) = (Vec::new(), Vec::new());
    for y in 0..side {
        for x in 0..side {
            if rng.random_bool(density) {
                xs.push(x - side / 2);
                ys.push(y - side / 2);
            }
        }
    }
    Ok((xs, ys))
}
