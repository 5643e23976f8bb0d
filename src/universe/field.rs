use super::{Bounds, NodeIdx, Universe, MIN_ROOT_LEVEL};
use crate::UniverseError;
use num_bigint::BigInt;
use tracing::{debug, warn};

/// Smallest root level whose square `-2^(level-1)..2^(level-1)` contains
/// every one of `values`.
pub(super) fn level_for_values(values: impl IntoIterator<Item = i64>) -> u32 {
    let m = values
        .into_iter()
        .map(|v| (v as i128 + 1).max(-(v as i128)))
        .max()
        .unwrap_or(0);
    if m <= 1 {
        return MIN_ROOT_LEVEL;
    }
    let bits = i128::BITS - (m - 1).leading_zeros();
    (1 + bits).max(MIN_ROOT_LEVEL)
}

/// Moves the elements satisfying `predicate` to the front of `list` and
/// returns their number. The order within both groups is not kept.
fn partition_in_place<T, P>(list: &mut [T], mut predicate: P) -> usize
where
    P: FnMut(&T) -> bool,
{
    let mut split = 0;
    for i in 0..list.len() {
        if predicate(&list[i]) {
            list.swap(split, i);
            split += 1;
        }
    }
    split
}

impl Universe {
    /// Replaces the field with the given live cells. The generation is reset
    /// to 0 and the checkpoint is dropped.
    ///
    /// `bounds` may hold the bounding box of the cells to skip a pass over
    /// them; a box that does not contain every cell is ignored.
    ///
    /// # Errors
    ///
    /// Fails if `xs` and `ys` differ in length, or if the node store cannot
    /// hold the field. The universe is unchanged in both cases.
    pub fn load_field(
        &mut self,
        xs: &[i64],
        ys: &[i64],
        bounds: Option<&Bounds>,
    ) -> Result<(), UniverseError> {
        if xs.len() != ys.len() {
            return Err(UniverseError::MismatchedCoordinates {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        self.run_pending_gc();

        let level = match bounds.and_then(|b| Self::level_for_hint(b, xs, ys)) {
            Some(level) => level,
            None => level_for_values(xs.iter().chain(ys).copied()),
        };
        let offset = 1i128 << (level - 1);
        let mut points: Vec<(u64, u64)> = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| ((x as i128 + offset) as u64, (y as i128 + offset) as u64))
            .collect();

        match self.setup_field(&mut points, level) {
            Ok(root) => {
                self.root = root;
                self.generation = BigInt::ZERO;
                self.checkpoint = None;
                debug!(cells = xs.len(), level, nodes = self.mem.len(), "loaded field");
                self.run_pending_gc();
                Ok(())
            }
            Err(e) => {
                warn!(%e, cells = xs.len(), "loading field aborted");
                self.collect_garbage();
                Err(e)
            }
        }
    }

    /// Root level derived from a bounding box, if the box holds every cell.
    fn level_for_hint(bounds: &Bounds, xs: &[i64], ys: &[i64]) -> Option<u32> {
        let [left, top, right, bottom] = [&bounds.left, &bounds.top, &bounds.right, &bounds.bottom]
            .map(|v| i64::try_from(v).ok());
        let (left, top, right, bottom) = (left?, top?, right?, bottom?);
        let inside = xs.iter().all(|x| (left..=right).contains(x))
            && ys.iter().all(|y| (top..=bottom).contains(y));
        if !inside {
            debug!(?bounds, "bounding box hint does not contain the field, ignored");
            return None;
        }
        Some(level_for_values([left, top, right, bottom]))
    }

    /// Builds the node of `level` holding `points`, given relative to its
    /// top-left corner. Reorders `points`.
    fn setup_field(
        &mut self,
        points: &mut [(u64, u64)],
        level: u32,
    ) -> Result<NodeIdx, UniverseError> {
        if points.is_empty() {
            return self.blank_nodes.get(level, &mut self.mem);
        }
        if level == 2 {
            return self.level2_setup(points);
        }

        let half = 1u64 << (level - 1);
        let north = partition_in_place(points, |&(_, y)| y & half == 0);
        let (north, south) = points.split_at_mut(north);
        let west = partition_in_place(north, |&(x, _)| x & half == 0);
        let (nw, ne) = north.split_at_mut(west);
        let west = partition_in_place(south, |&(x, _)| x & half == 0);
        let (sw, se) = south.split_at_mut(west);

        let nw = self.setup_field(nw, level - 1)?;
        let ne = self.setup_field(ne, level - 1)?;
        let sw = self.setup_field(sw, level - 1)?;
        let se = self.setup_field(se, level - 1)?;
        self.mem.find_or_create_node(nw, ne, sw, se)
    }

    /// Level-2 node of the points, which all fall into one 4x4 block.
    fn level2_setup(&mut self, points: &[(u64, u64)]) -> Result<NodeIdx, UniverseError> {
        let set = points
            .iter()
            .fold(0u16, |set, &(x, y)| set | 1 << ((x & 3) | (y & 3) << 2));
        if let Some(&cached) = self.level2_cache.get(&set) {
            return Ok(cached);
        }
        let nw = self.level1_create(set)?;
        let ne = self.level1_create(set >> 2)?;
        let sw = self.level1_create(set >> 8)?;
        let se = self.level1_create(set >> 10)?;
        let node = self.mem.find_or_create_node(nw, ne, sw, se)?;
        self.level2_cache.insert(set, node);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_values() {
        assert_eq!(level_for_values([]), MIN_ROOT_LEVEL);
        assert_eq!(level_for_values([0, -1, 3, -4]), 3);
        assert_eq!(level_for_values([4]), 4);
        assert_eq!(level_for_values([-5]), 4);
        assert_eq!(level_for_values([-8, 7]), 4);
        assert_eq!(level_for_values([i64::MIN]), 64);
        assert_eq!(level_for_values([i64::MAX]), 64);
    }

    #[test]
    fn test_partition_in_place() {
        let mut list = [5, 2, 8, 1, 4, 7, 6];
        let split = partition_in_place(&mut list, |&x| x % 2 == 0);
        assert_eq!(split, 4);
        assert!(list[..split].iter().all(|x| x % 2 == 0));
        assert!(list[split..].iter().all(|x| x % 2 != 0));
        assert_eq!(partition_in_place(&mut [] as &mut [i32], |_| true), 0);
    }

    #[test]
    fn test_load_field() {
        let xs = [0, -1, 5, -8, 7];
        let ys = [0, 3, -8, 7, 7];
        let mut universe = Universe::new();
        universe.load_field(&xs, &ys, None).unwrap();
        assert_eq!(universe.level(), 4);
        assert_eq!(*universe.population(), BigInt::from(5));
        for (&x, &y) in xs.iter().zip(&ys) {
            assert!(universe.get_bit(&BigInt::from(x), &BigInt::from(y)));
        }
        assert!(!universe.get_bit(&BigInt::from(1), &BigInt::from(0)));
    }

    #[test]
    fn test_duplicate_cells() {
        let mut universe = Universe::new();
        universe.load_field(&[2, 2, 2], &[1, 1, 1], None).unwrap();
        assert_eq!(*universe.population(), BigInt::from(1));
    }

    #[test]
    fn test_same_field_same_root() {
        let mut universe = Universe::new();
        universe.load_field(&[1, 2, 3], &[-2, 0, 1], None).unwrap();
        let root = universe.root;
        universe.load_field(&[3, 1, 2], &[1, -2, 0], None).unwrap();
        assert_eq!(universe.root, root);
    }

    #[test]
    fn test_bounds_hint() {
        let (xs, ys) = ([0, 1, 2], [0, 0, 0]);
        let mut universe = Universe::new();

        let hint = Bounds::of_cells(&[-100, 100], &[-100, 100]).unwrap();
        universe.load_field(&xs, &ys, Some(&hint)).unwrap();
        assert_eq!(universe.level(), 8);
        assert_eq!(*universe.population(), BigInt::from(3));

        // too small to hold the cells
        let hint = Bounds::of_cells(&[0, 1], &[0, 0]).unwrap();
        universe.load_field(&xs, &ys, Some(&hint)).unwrap();
        assert_eq!(universe.level(), 3);
        assert!(universe.get_bit(&BigInt::from(2), &BigInt::from(0)));

        // does not fit i64
        let hint = Bounds {
            right: BigInt::from(1) << 70u32,
            ..hint
        };
        universe.load_field(&xs, &ys, Some(&hint)).unwrap();
        assert_eq!(universe.level(), 3);
    }

    #[test]
    fn test_mismatched_coordinates() {
        let mut universe = Universe::new();
        universe.load_field(&[1], &[1], None).unwrap();
        let err = universe.load_field(&[1, 2], &[1], None).unwrap_err();
        assert!(matches!(
            err,
            UniverseError::MismatchedCoordinates { xs: 2, ys: 1 }
        ));
        assert_eq!(*universe.population(), BigInt::from(1));
    }

    #[test]
    fn test_load_resets_generation_and_checkpoint() {
        let mut universe = Universe::new();
        universe.load_field(&[0, 1, 2], &[0, 0, 0], None).unwrap();
        universe.save_checkpoint();
        universe.advance().unwrap();
        universe.reset().unwrap();
        assert_eq!(*universe.generation(), BigInt::ZERO);
        assert_eq!(*universe.population(), BigInt::ZERO);
        assert!(!universe.has_checkpoint());
    }

    #[test]
    fn test_extreme_coordinates() {
        let mut universe = Universe::new();
        let xs = [i64::MIN, i64::MAX, 0];
        let ys = [i64::MAX, i64::MIN, 0];
        universe.load_field(&xs, &ys, None).unwrap();
        assert_eq!(universe.level(), 64);
        assert_eq!(*universe.population(), BigInt::from(3));
        for (&x, &y) in xs.iter().zip(&ys) {
            assert!(universe.get_bit(&BigInt::from(x), &BigInt::from(y)));
        }
        assert_eq!(
            Some(universe.root_bounds()),
            Bounds::of_cells(&xs, &ys)
        );
    }
}
