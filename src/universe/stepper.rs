use super::{NodeIdx, Universe};
use crate::UniverseError;

impl Universe {
    /// Canonical level-1 node from bits 0 (nw), 1 (ne), 4 (sw) and 5 (se) of
    /// a 4x4 bitmask.
    pub(super) fn level1_create(&mut self, bits: u16) -> Result<NodeIdx, UniverseError> {
        let [nw, ne, sw, se] = [0, 1, 4, 5].map(|i| self.mem.leaf(bits >> i & 1 != 0));
        self.mem.find_or_create_node(nw, ne, sw, se)
    }

    /// Advances the 4x4 cells of a level-2 node one generation and returns
    /// the central 2x2 of the result.
    fn step_level2(&mut self, node: NodeIdx) -> Result<NodeIdx, UniverseError> {
        let n = self.mem.get(node);
        let mut bitmask = 0u16;
        for (i, &child) in n.parts().iter().enumerate() {
            let (x0, y0) = ((i & 1) * 2, (i >> 1) * 2);
            for (j, &leaf) in self.mem.get(child).parts().iter().enumerate() {
                let (x, y) = (x0 + (j & 1), y0 + (j >> 1));
                if leaf == NodeIdx::ALIVE {
                    bitmask |= 1 << (y * 4 + x);
                }
            }
        }
        let [nw, ne, sw, se] =
            [0, 1, 4, 5].map(|shift| self.mem.leaf(self.rules.evaluate(bitmask >> shift)));
        self.mem.find_or_create_node(nw, ne, sw, se)
    }

    /// The nine overlapping half-size nodes of `node`, row by row.
    fn nine_children_overlapping(&mut self, node: NodeIdx) -> Result<[NodeIdx; 9], UniverseError> {
        let [nw, ne, sw, se] = self.mem.get(node).parts();
        let [[_, nwne, nwsw, nwse], [nenw, _, nesw, nese], [swnw, swne, _, swse], [senw, sene, sesw, _]] =
            [nw, ne, sw, se].map(|x| self.mem.get(x).parts());

        let n01 = self.mem.find_or_create_node(nwne, nenw, nwse, nesw)?;
        let n10 = self.mem.find_or_create_node(nwsw, nwse, swnw, swne)?;
        let n11 = self.mem.find_or_create_node(nwse, nesw, swne, senw)?;
        let n12 = self.mem.find_or_create_node(nesw, nese, senw, sene)?;
        let n21 = self.mem.find_or_create_node(swne, senw, swse, sesw)?;
        Ok([nw, n01, ne, n10, n11, n12, sw, n21, se])
    }

    /// Centers of the nine overlapping half-size nodes of `node`. Together they
    /// tile the central `3/4 x 3/4` of `node` without overlap.
    fn nine_children_disjoint(&mut self, node: NodeIdx) -> Result<[NodeIdx; 9], UniverseError> {
        let [[nwnw, nwne, nwsw, nwse], [nenw, nene, nesw, nese], [swnw, swne, swsw, swse], [senw, sene, sesw, sese]] =
            self.mem
                .get(node)
                .parts()
                .map(|x| self.mem.get(x).parts().map(|y| self.mem.get(y).parts()));

        let groups = [
            [nwnw, nwne, nwsw, nwse],
            [nwne, nenw, nwse, nesw],
            [nenw, nene, nesw, nese],
            [nwsw, nwse, swnw, swne],
            [nwse, nesw, swne, senw],
            [nesw, nese, senw, sene],
            [swnw, swne, swsw, swse],
            [swne, senw, swse, sesw],
            [senw, sene, sesw, sese],
        ];
        let mut arr = [NodeIdx::DEAD; 9];
        for (dst, [nw, ne, sw, se]) in arr.iter_mut().zip(groups) {
            *dst = self.mem.find_or_create_node(nw[3], ne[2], sw[1], se[0])?;
        }
        Ok(arr)
    }

    fn four_children_overlapping(&mut self, arr: &[NodeIdx; 9]) -> Result<[NodeIdx; 4], UniverseError> {
        Ok([
            self.mem.find_or_create_node(arr[0], arr[1], arr[3], arr[4])?,
            self.mem.find_or_create_node(arr[1], arr[2], arr[4], arr[5])?,
            self.mem.find_or_create_node(arr[3], arr[4], arr[6], arr[7])?,
            self.mem.find_or_create_node(arr[4], arr[5], arr[7], arr[8])?,
        ])
    }

    /// Center of `node` after `2^(level - 2)` generations.
    ///
    /// # Panics
    ///
    /// Panics if `node` is below level 2.
    pub(super) fn quick_step(&mut self, node: NodeIdx) -> Result<NodeIdx, UniverseError> {
        let n = self.mem.get(node);
        assert!(n.level >= 2, "cannot step a node below level 2");
        if let Some(&cache) = n.quick_cache.get() {
            return Ok(cache);
        }
        if n.is_empty() {
            return Ok(n.nw);
        }

        let frame = self.mem.pin_mark();
        let result = if n.level == 2 {
            self.step_level2(node)?
        } else {
            // First stage
            let mut arr9 = self.nine_children_overlapping(node)?;
            for x in arr9.iter_mut() {
                *x = self.quick_step(*x)?;
            }
            // Second stage
            let mut arr4 = self.four_children_overlapping(&arr9)?;
            for x in arr4.iter_mut() {
                *x = self.quick_step(*x)?;
            }
            let [nw, ne, sw, se] = arr4;
            self.mem.find_or_create_node(nw, ne, sw, se)?
        };
        // intermediate nodes of this frame become garbage
        self.mem.unpin_to(frame, result);
        let _ = self.mem.get(node).quick_cache.set(result);
        Ok(result)
    }

    /// Center of `node` after `2^step_log2` generations.
    ///
    /// # Panics
    ///
    /// Panics if `node` is too small for the step: its level must be at least
    /// `step_log2 + 2`.
    pub(super) fn full_step(&mut self, node: NodeIdx) -> Result<NodeIdx, UniverseError> {
        let n = self.mem.get(node);
        let level = n.level;
        assert!(
            level >= 2 && level - 2 >= self.step_log2,
            "node of level {level} is too small for 2^{} generations",
            self.step_log2
        );
        if let Some(&cache) = n.cache.get() {
            return Ok(cache);
        }
        if n.is_empty() {
            return Ok(n.nw);
        }
        if level - 2 == self.step_log2 {
            return self.quick_step(node);
        }

        let frame = self.mem.pin_mark();
        let arr9 = self.nine_children_disjoint(node)?;
        let mut arr4 = self.four_children_overlapping(&arr9)?;
        for x in arr4.iter_mut() {
            *x = self.full_step(*x)?;
        }
        let [nw, ne, sw, se] = arr4;
        let result = self.mem.find_or_create_node(nw, ne, sw, se)?;
        self.mem.unpin_to(frame, result);
        let _ = self.mem.get(node).cache.set(result);
        Ok(result)
    }
}
