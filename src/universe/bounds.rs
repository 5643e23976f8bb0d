use super::{NodeIdx, Universe};
use num_bigint::BigInt;

/// Inclusive bounding box of live cells.
///
/// An empty universe has the zero box: all four sides are 0, which is
/// indistinguishable from the box of a single cell at the origin unless the
/// population is checked as well.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub left: BigInt,
    pub top: BigInt,
    pub right: BigInt,
    pub bottom: BigInt,
}

impl Bounds {
    /// Box of a single cell.
    pub fn cell(x: BigInt, y: BigInt) -> Self {
        Self {
            left: x.clone(),
            top: y.clone(),
            right: x,
            bottom: y,
        }
    }

    /// Tightest box containing the given cells, `None` if there are none.
    pub fn of_cells(xs: &[i64], ys: &[i64]) -> Option<Self> {
        let x_min = xs.iter().min()?;
        let x_max = xs.iter().max()?;
        let y_min = ys.iter().min()?;
        let y_max = ys.iter().max()?;
        Some(Self {
            left: BigInt::from(*x_min),
            top: BigInt::from(*y_min),
            right: BigInt::from(*x_max),
            bottom: BigInt::from(*y_max),
        })
    }

    pub fn width(&self) -> BigInt {
        &self.right - &self.left + 1u32
    }

    pub fn height(&self) -> BigInt {
        &self.bottom - &self.top + 1u32
    }

    pub fn contains(&self, x: &BigInt, y: &BigInt) -> bool {
        self.left <= *x && *x <= self.right && self.top <= *y && *y <= self.bottom
    }

    /// Extends the box to contain the cell.
    pub fn include(&mut self, x: &BigInt, y: &BigInt) {
        if *x < self.left {
            self.left = x.clone();
        }
        if *x > self.right {
            self.right = x.clone();
        }
        if *y < self.top {
            self.top = y.clone();
        }
        if *y > self.bottom {
            self.bottom = y.clone();
        }
    }

    /// Whether the square with top-left corner `(left, top)` and side `size`
    /// lies within the box.
    fn covers_square(&self, left: &BigInt, top: &BigInt, size: &BigInt) -> bool {
        *left >= self.left
            && *top >= self.top
            && left + size - 1u32 <= self.right
            && top + size - 1u32 <= self.bottom
    }
}

const LEFT: u8 = 1;
const TOP: u8 = 2;
const RIGHT: u8 = 4;
const BOTTOM: u8 = 8;

impl Universe {
    /// Tightest box around the live cells, or the zero box if there are none.
    pub fn root_bounds(&self) -> Bounds {
        let root = self.mem.get(self.root);
        if root.is_empty() {
            return Bounds::default();
        }
        let corner = -(BigInt::from(1) << (root.level - 1));
        let mut bounds = None;
        self.node_boundary(
            self.root,
            &corner,
            &corner,
            LEFT | TOP | RIGHT | BOTTOM,
            &mut bounds,
        );
        bounds.unwrap_or_default()
    }

    /// Extends `bounds` with the live cells of `node` whose top-left corner is
    /// at `(left, top)`. Only the sides set in `find_mask` are searched for.
    fn node_boundary(
        &self,
        node: NodeIdx,
        left: &BigInt,
        top: &BigInt,
        find_mask: u8,
        bounds: &mut Option<Bounds>,
    ) {
        let n = self.mem.get(node);
        if n.is_empty() || find_mask == 0 {
            return;
        }
        if n.is_leaf() {
            match bounds {
                Some(b) => b.include(left, top),
                None => *bounds = Some(Bounds::cell(left.clone(), top.clone())),
            }
            return;
        }
        if let Some(b) = bounds {
            if b.covers_square(left, top, &(BigInt::from(1) << n.level)) {
                return;
            }
        }

        let [nw, ne, sw, se] = n.parts().map(|x| self.mem.get(x));
        let (mut find_nw, mut find_ne, mut find_sw, mut find_se) =
            (find_mask, find_mask, find_mask, find_mask);
        if !nw.is_empty() {
            find_sw &= !TOP;
            find_ne &= !LEFT;
            find_se &= !(TOP | LEFT);
        }
        if !ne.is_empty() {
            find_se &= !TOP;
            find_nw &= !RIGHT;
            find_sw &= !(TOP | RIGHT);
        }
        if !sw.is_empty() {
            find_nw &= !BOTTOM;
            find_se &= !LEFT;
            find_ne &= !(BOTTOM | LEFT);
        }
        if !se.is_empty() {
            find_ne &= !BOTTOM;
            find_sw &= !RIGHT;
            find_nw &= !(BOTTOM | RIGHT);
        }

        let half = BigInt::from(1) << (n.level - 1);
        let (right, bottom) = (left + &half, top + &half);
        self.node_boundary(n.nw, left, top, find_nw, bounds);
        self.node_boundary(n.ne, &right, top, find_ne, bounds);
        self.node_boundary(n.sw, left, &bottom, find_sw, bounds);
        self.node_boundary(n.se, &right, &bottom, find_se, bounds);
    }
}
