use super::{NodeIdx, Universe, MIN_ROOT_LEVEL};
use crate::UniverseError;
use num_bigint::{BigInt, Sign};
use tracing::warn;

/// Smallest root level whose square contains the coordinate `v` on one axis.
fn level_for_coordinate(v: &BigInt) -> u64 {
    let m = (v + 1u32).max(-v);
    if m <= BigInt::from(1u32) {
        return MIN_ROOT_LEVEL as u64;
    }
    (1 + (m - 1u32).bits()).max(MIN_ROOT_LEVEL as u64)
}

/// Descends into the quadrant of `(x, y)`, given relative to the center of a
/// node of `level`, and makes the coordinates relative to the quadrant's center.
fn quadrant(level: u32, x: &mut BigInt, y: &mut BigInt) -> usize {
    let (west, north) = (x.sign() == Sign::Minus, y.sign() == Sign::Minus);
    if level > 1 {
        let offset = BigInt::from(1) << (level - 2);
        if west {
            *x += &offset;
        } else {
            *x -= &offset;
        }
        if north {
            *y += &offset;
        } else {
            *y -= &offset;
        }
    }
    (!west as usize) | (!north as usize) << 1
}

impl Universe {
    /// Whether the cell at `(x, y)` is alive. Cells outside the field are dead.
    pub fn get_bit(&self, x: &BigInt, y: &BigInt) -> bool {
        let level = self.level();
        if level_for_coordinate(x).max(level_for_coordinate(y)) > level as u64 {
            return false;
        }
        let (mut x, mut y) = (x.clone(), y.clone());
        let mut node = self.root;
        loop {
            let n = self.mem.get(node);
            if n.is_leaf() {
                return node == NodeIdx::ALIVE;
            }
            if n.is_empty() {
                return false;
            }
            node = n.parts()[quadrant(n.level, &mut x, &mut y)];
        }
    }

    /// Sets the state of the cell at `(x, y)`. The field grows as needed to
    /// hold a live cell; clearing a cell outside the field does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`UniverseError::ResourceExhausted`] if the node store fills up,
    /// leaving the universe unchanged.
    pub fn set_bit(&mut self, x: &BigInt, y: &BigInt, alive: bool) -> Result<(), UniverseError> {
        self.run_pending_gc();
        let required = level_for_coordinate(x).max(level_for_coordinate(y));
        if !alive && required > self.level() as u64 {
            return Ok(());
        }
        match self.root_with_bit(required, x, y, alive) {
            Ok(root) => {
                self.root = root;
                self.run_pending_gc();
                Ok(())
            }
            Err(e) => {
                warn!(%e, "setting a cell aborted");
                self.collect_garbage();
                Err(e)
            }
        }
    }

    fn root_with_bit(
        &mut self,
        required: u64,
        x: &BigInt,
        y: &BigInt,
        alive: bool,
    ) -> Result<NodeIdx, UniverseError> {
        let mut root = self.root;
        while (self.mem.get(root).level as u64) < required {
            root = self.expand_universe(root)?;
        }
        let root = self.node_set_bit(root, x.clone(), y.clone(), alive)?;
        self.compact(root)
    }

    /// Copy of `node` with the cell at `(x, y)`, relative to its center,
    /// set to `alive`.
    fn node_set_bit(
        &mut self,
        node: NodeIdx,
        mut x: BigInt,
        mut y: BigInt,
        alive: bool,
    ) -> Result<NodeIdx, UniverseError> {
        let n = self.mem.get(node);
        if n.is_leaf() {
            return Ok(self.mem.leaf(alive));
        }
        let mut parts = n.parts();
        let i = quadrant(n.level, &mut x, &mut y);
        parts[i] = self.node_set_bit(parts[i], x, y, alive)?;
        let [nw, ne, sw, se] = parts;
        self.mem.find_or_create_node(nw, ne, sw, se)
    }

    /// Coordinates of every live cell, in no particular order.
    pub fn live_cells(&self) -> Vec<(BigInt, BigInt)> {
        let mut cells = Vec::new();
        let corner = -(BigInt::from(1) << (self.level() - 1));
        let mut stack = vec![(self.root, corner.clone(), corner)];
        while let Some((idx, left, top)) = stack.pop() {
            let n = self.mem.get(idx);
            if n.is_empty() {
                continue;
            }
            if n.is_leaf() {
                cells.push((left, top));
                continue;
            }
            let half = BigInt::from(1) << (n.level - 1);
            let (right, bottom) = (&left + &half, &top + &half);
            stack.push((n.se, right.clone(), bottom.clone()));
            stack.push((n.sw, left.clone(), bottom));
            stack.push((n.ne, right, top.clone()));
            stack.push((n.nw, left, top));
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: i64) -> BigInt {
        BigInt::from(v)
    }

    #[test]
    fn test_level_for_coordinate() {
        assert_eq!(level_for_coordinate(&big(0)), 3);
        assert_eq!(level_for_coordinate(&big(-4)), 3);
        assert_eq!(level_for_coordinate(&big(4)), 4);
        assert_eq!(level_for_coordinate(&(big(1) << 100u32)), 102);
        assert_eq!(level_for_coordinate(&-(big(1) << 100u32)), 101);
    }

    #[test]
    fn test_quadrant() {
        let (mut x, mut y) = (big(-1), big(0));
        assert_eq!(quadrant(1, &mut x, &mut y), 2);
        assert_eq!((x, y), (big(-1), big(0)));
        let (mut x, mut y) = (big(3), big(-4));
        assert_eq!(quadrant(3, &mut x, &mut y), 1);
        assert_eq!((x, y), (big(1), big(-2)));
    }

    #[test]
    fn test_get_bit_outside_field() {
        let mut universe = Universe::new();
        universe.load_field(&[0], &[0], None).unwrap();
        assert!(universe.get_bit(&big(0), &big(0)));
        assert!(!universe.get_bit(&(big(1) << 80u32), &big(0)));
        assert!(!universe.get_bit(&big(4), &big(0)));
        assert!(!universe.get_bit(&big(-5), &big(-5)));
    }

    #[test]
    fn test_set_bit_grows_field() {
        let mut universe = Universe::new();
        let far = big(1) << 70u32;
        universe.set_bit(&far, &-far.clone(), true).unwrap();
        assert_eq!(universe.level(), 72);
        assert!(universe.get_bit(&far, &-far.clone()));
        assert_eq!(*universe.population(), big(1));
        assert_eq!(universe.live_cells(), vec![(far.clone(), -far.clone())]);

        universe.set_bit(&far, &-far.clone(), false).unwrap();
        assert_eq!(*universe.population(), BigInt::ZERO);
        assert_eq!(universe.level(), MIN_ROOT_LEVEL);
    }

    #[test]
    fn test_clear_outside_field_is_noop() {
        let mut universe = Universe::new();
        universe.load_field(&[1], &[1], None).unwrap();
        let root = universe.root;
        universe.set_bit(&big(1000), &big(0), false).unwrap();
        assert_eq!(universe.root, root);
        // clearing a dead cell inside the field leaves it as is too
        universe.set_bit(&big(-2), &big(3), false).unwrap();
        assert_eq!(universe.root, root);
    }

    #[test]
    fn test_set_bit_matches_load_field() {
        let (xs, ys) = ([-3, 0, 2, 3], [1, -4, 2, 3]);
        let mut loaded = Universe::new();
        loaded.load_field(&xs, &ys, None).unwrap();

        let mut universe = Universe::new();
        universe.set_bit(&big(30), &big(30), true).unwrap();
        for (&x, &y) in xs.iter().zip(&ys) {
            universe.set_bit(&big(x), &big(y), true).unwrap();
        }
        universe.set_bit(&big(30), &big(30), false).unwrap();

        let mut expected = loaded.live_cells();
        let mut cells = universe.live_cells();
        expected.sort();
        cells.sort();
        assert_eq!(cells, expected);
        assert_eq!(universe.level(), loaded.level());
    }

    #[test]
    fn test_live_cells() {
        let mut universe = Universe::new();
        assert!(universe.live_cells().is_empty());
        universe.load_field(&[-4, 3, 0], &[3, -4, 0], None).unwrap();
        let mut cells = universe.live_cells();
        cells.sort();
        assert_eq!(
            cells,
            vec![(big(-4), big(3)), (big(0), big(0)), (big(3), big(-4))]
        );
    }
}
