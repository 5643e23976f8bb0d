use num_bigint::BigInt;
use std::cell::OnceCell;

/// Location of a node in the node store.
///
/// Indices are only meaningful until the next garbage collection, which
/// renumbers every surviving node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) struct NodeIdx(pub(super) u32);

impl NodeIdx {
    /// The dead cell.
    pub(super) const DEAD: NodeIdx = NodeIdx(0);
    /// The live cell.
    pub(super) const ALIVE: NodeIdx = NodeIdx(1);
    /// Marks the end of a bucket chain.
    pub(super) const NIL: NodeIdx = NodeIdx(u32::MAX);
}

/// A canonical node of the quadtree covering `2^level x 2^level` cells.
///
/// Everything except the two memoization slots is fixed at creation. For the
/// two leaves (level 0) `nw`, `ne`, `sw`, `se` are meaningless and set to
/// [`NodeIdx::DEAD`].
#[derive(Clone, Debug, Default)]
pub(super) struct QuadTreeNode {
    pub(super) nw: NodeIdx,
    pub(super) ne: NodeIdx,
    pub(super) sw: NodeIdx,
    pub(super) se: NodeIdx,
    pub(super) level: u32,
    pub(super) population: BigInt,
    /// the node's center after `2^step_log2` generations
    pub(super) cache: OnceCell<NodeIdx>,
    /// the node's center after `2^(level - 2)` generations
    pub(super) quick_cache: OnceCell<NodeIdx>,
}

impl QuadTreeNode {
    pub(super) fn leaf(alive: bool) -> Self {
        Self {
            population: BigInt::from(alive as u8),
            ..Default::default()
        }
    }

    pub(super) fn hash(nw: NodeIdx, ne: NodeIdx, sw: NodeIdx, se: NodeIdx) -> usize {
        let h = 0u32
            .wrapping_add(nw.0.wrapping_mul(5))
            .wrapping_add(ne.0.wrapping_mul(17))
            .wrapping_add(sw.0.wrapping_mul(257))
            .wrapping_add(se.0.wrapping_mul(65537));
        h.wrapping_add(h >> 11) as usize
    }

    pub(super) fn parts(&self) -> [NodeIdx; 4] {
        [self.nw, self.ne, self.sw, self.se]
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.level == 0
    }

    pub(super) fn is_empty(&self) -> bool {
        self.population == BigInt::ZERO
    }
}
