use super::{NodeIdx, QuadTreeNode};
use crate::{UniverseConfig, UniverseError};
use num_bigint::BigInt;
use tracing::{debug, warn};

/// Hashtable that stores canonical nodes of the quadtree.
///
/// Nodes live in an arena addressed by [`NodeIdx`]; the two leaves occupy the
/// reserved indices 0 and 1 and never enter the hashtable. Collisions are
/// resolved by chaining through `next`, a side table parallel to the arena,
/// so nodes carry no hashtable bookkeeping of their own.
///
/// While a step is in progress the store keeps a stack of pinned handles. An
/// insertion that hits the node limit then sweeps in place: nodes that the pins
/// do not reach are freed and their slots reused, while every reachable node
/// keeps its index.
pub(super) struct MemoryManager {
    /// all allocated nodes
    nodes: Vec<QuadTreeNode>,
    /// next item in the bucket of the node with the same index
    next: Vec<NodeIdx>,
    /// heads of the bucket chains
    hashtable: Vec<NodeIdx>,
    load_factor: f64,
    max_table_log2: u32,
    /// no insertions beyond this number of nodes
    node_limit: usize,
    /// set when the table got overloaded since the last collection
    gc_pending: bool,
    saturation_reported: bool,
    /// slots of swept nodes, reused by insertions
    free: Vec<NodeIdx>,
    /// handles that the step in progress still needs, `None` between steps
    pins: Option<Vec<NodeIdx>>,
}

impl MemoryManager {
    /// Indices below this one are reserved for the leaves.
    const FIRST_NODE: usize = 2;

    pub(super) fn with_config(config: &UniverseConfig) -> Self {
        Self {
            nodes: vec![QuadTreeNode::leaf(false), QuadTreeNode::leaf(true)],
            next: vec![NodeIdx::NIL; Self::FIRST_NODE],
            hashtable: vec![NodeIdx::NIL; 1 << config.initial_table_log2],
            load_factor: config.load_factor,
            max_table_log2: config.max_table_log2,
            node_limit: config.node_limit(),
            gc_pending: false,
            saturation_reported: false,
            free: vec![],
            pins: None,
        }
    }

    /// Get a const reference to the node at the given index.
    #[inline]
    pub(super) fn get(&self, idx: NodeIdx) -> &QuadTreeNode {
        &self.nodes[idx.0 as usize]
    }

    pub(super) fn leaf(&self, alive: bool) -> NodeIdx {
        if alive {
            NodeIdx::ALIVE
        } else {
            NodeIdx::DEAD
        }
    }

    /// Find the node with the given parts. If it is not found, it is created.
    /// While pinning, the returned handle is pinned.
    ///
    /// # Panics
    ///
    /// Panics if the parts are not of the same level.
    pub(super) fn find_or_create_node(
        &mut self,
        nw: NodeIdx,
        ne: NodeIdx,
        sw: NodeIdx,
        se: NodeIdx,
    ) -> Result<NodeIdx, UniverseError> {
        let level = self.get(nw).level;
        assert!(
            [ne, sw, se].iter().all(|&x| self.get(x).level == level),
            "parts of a node must share a level"
        );

        let i = QuadTreeNode::hash(nw, ne, sw, se) & self.mask();
        let mut node = self.hashtable[i];
        let mut prev = NodeIdx::NIL;
        // search for the node in the linked list
        while node != NodeIdx::NIL {
            let n = self.get(node);
            if n.parts() == [nw, ne, sw, se] {
                assert_eq!(n.level, level + 1, "inconsistent bucket chain");
                // move the node to the front of the list
                if prev != NodeIdx::NIL {
                    self.next[prev.0 as usize] = self.next[node.0 as usize];
                    self.next[node.0 as usize] = self.hashtable[i];
                    self.hashtable[i] = node;
                }
                self.pin(node);
                return Ok(node);
            }
            prev = node;
            node = self.next[node.0 as usize];
        }

        if Self::FIRST_NODE + self.len() >= self.node_limit && !self.sweep([nw, ne, sw, se]) {
            return Err(UniverseError::ResourceExhausted {
                nodes: self.len(),
                limit: self.node_limit,
            });
        }

        let population = [nw, ne, sw, se]
            .iter()
            .map(|&x| &self.get(x).population)
            .sum::<BigInt>();
        let node = QuadTreeNode {
            nw,
            ne,
            sw,
            se,
            level: level + 1,
            population,
            ..Default::default()
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx.0 as usize] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.next.push(NodeIdx::NIL);
                NodeIdx(self.nodes.len() as u32 - 1)
            }
        };
        // a sweep keeps the number of buckets, so `i` is still valid
        self.next[idx.0 as usize] = self.hashtable[i];
        self.hashtable[i] = idx;
        self.pin(idx);

        if self.len() as f64 > self.capacity() as f64 * self.load_factor {
            self.on_overload();
        }
        Ok(idx)
    }

    /// Grows the bucket array if possible and asks for a collection at the
    /// next safe point. Indices stay valid.
    fn on_overload(&mut self) {
        let table_log2 = self.hashtable.len().ilog2();
        if table_log2 < self.max_table_log2 {
            self.rebuild_hashtable(table_log2 + 1);
            debug!(
                nodes = self.len(),
                buckets = self.hashtable.len(),
                "grew node hashtable"
            );
        } else if !self.saturation_reported {
            warn!(
                nodes = self.len(),
                buckets = self.hashtable.len(),
                "node hashtable is at its size limit, bucket chains will lengthen"
            );
            self.saturation_reported = true;
        }
        self.gc_pending = true;
    }

    /// Rebuilds all bucket chains for a table of `2^table_log2` buckets.
    fn rebuild_hashtable(&mut self, table_log2: u32) {
        let mask = (1usize << table_log2) - 1;
        let mut hashtable = vec![NodeIdx::NIL; mask + 1];
        for (i, n) in self.nodes.iter().enumerate().skip(Self::FIRST_NODE) {
            // free slot
            if n.is_leaf() {
                continue;
            }
            let bucket = QuadTreeNode::hash(n.nw, n.ne, n.sw, n.se) & mask;
            self.next[i] = hashtable[bucket];
            hashtable[bucket] = NodeIdx(i as u32);
        }
        self.hashtable = hashtable;
    }

    /// Starts pinning: until [`Self::end_pinning`], `roots` and every handle
    /// returned by [`Self::find_or_create_node`] survive sweeps.
    pub(super) fn begin_pinning(&mut self, roots: &[NodeIdx]) {
        self.pins = Some(roots.to_vec());
    }

    pub(super) fn end_pinning(&mut self) {
        self.pins = None;
    }

    /// Current height of the pin stack.
    pub(super) fn pin_mark(&self) -> usize {
        self.pins.as_ref().map_or(0, Vec::len)
    }

    /// Unpins everything pinned since `mark` except `keep`.
    pub(super) fn unpin_to(&mut self, mark: usize, keep: NodeIdx) {
        if let Some(pins) = self.pins.as_mut() {
            pins.truncate(mark);
            pins.push(keep);
        }
    }

    fn pin(&mut self, idx: NodeIdx) {
        if let Some(pins) = self.pins.as_mut() {
            pins.push(idx);
        }
    }

    /// Frees the slots of all nodes that are reachable neither from the pins
    /// nor from `parts`, without moving the others. Returns `false` if there
    /// is nothing pinned or too little was freed to go on.
    fn sweep(&mut self, parts: [NodeIdx; 4]) -> bool {
        let Some(pins) = self.pins.as_ref() else {
            return false;
        };
        let before = self.len();

        let mut marked = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeIdx> = pins.iter().copied().chain(parts).collect();
        while let Some(idx) = stack.pop() {
            let i = idx.0 as usize;
            if i < Self::FIRST_NODE || marked[i] {
                continue;
            }
            marked[i] = true;
            let n = &self.nodes[i];
            stack.extend(n.parts());
            stack.extend(n.cache.get().copied());
            stack.extend(n.quick_cache.get().copied());
        }
        for (i, n) in self.nodes.iter_mut().enumerate().skip(Self::FIRST_NODE) {
            if !marked[i] && !n.is_leaf() {
                *n = QuadTreeNode::default();
                self.free.push(NodeIdx(i as u32));
            }
        }
        self.rebuild_hashtable(self.hashtable.len().ilog2());
        // the survivors are still scattered
        self.gc_pending = true;

        let freed = before - self.len();
        debug!(freed, nodes = self.len(), "swept nodes during a step");
        freed * 16 >= self.node_limit
    }

    /// Whether the table got overloaded since the last collection.
    pub(super) fn gc_pending(&self) -> bool {
        self.gc_pending
    }

    /// Drops every node that is not reachable from `roots` through parts and
    /// memoization slots, and renumbers the survivors densely.
    ///
    /// Surviving nodes are moved, not rebuilt. `roots` are rewritten in place to
    /// their new indices; every other index obtained before the call is invalid
    /// afterwards.
    pub(super) fn collect_garbage(&mut self, roots: &mut [NodeIdx]) {
        let before = self.len();

        let mut remap = vec![NodeIdx::NIL; self.nodes.len()];
        remap[NodeIdx::DEAD.0 as usize] = NodeIdx::DEAD;
        remap[NodeIdx::ALIVE.0 as usize] = NodeIdx::ALIVE;
        let mut order = Vec::new();
        let mut stack = roots.to_vec();
        while let Some(idx) = stack.pop() {
            if remap[idx.0 as usize] != NodeIdx::NIL {
                continue;
            }
            remap[idx.0 as usize] = NodeIdx((Self::FIRST_NODE + order.len()) as u32);
            order.push(idx);
            let n = self.get(idx);
            stack.extend(n.parts());
            stack.extend(n.cache.get().copied());
            stack.extend(n.quick_cache.get().copied());
        }

        let mut old = std::mem::take(&mut self.nodes);
        let mut nodes = Vec::with_capacity(Self::FIRST_NODE + order.len());
        nodes.extend(old.drain(..Self::FIRST_NODE));
        let r = |x: NodeIdx| remap[x.0 as usize];
        for idx in order {
            let n = &mut old[idx.0 as usize - Self::FIRST_NODE];
            let mut n = std::mem::take(n);
            [n.nw, n.ne, n.sw, n.se] = n.parts().map(r);
            for slot in [&mut n.cache, &mut n.quick_cache] {
                if let Some(x) = slot.take() {
                    let _ = slot.set(r(x));
                }
            }
            nodes.push(n);
        }
        self.nodes = nodes;
        for root in roots.iter_mut() {
            *root = r(*root);
        }

        let mut table_log2 = self.hashtable.len().ilog2();
        let threshold = |log2: u32| (1usize << log2) as f64 * self.load_factor / 2.0;
        while self.len() as f64 > threshold(table_log2) && table_log2 < self.max_table_log2 {
            table_log2 += 1;
        }
        self.free.clear();
        self.next = vec![NodeIdx::NIL; self.nodes.len()];
        self.rebuild_hashtable(table_log2);
        self.gc_pending = false;
        self.saturation_reported = false;

        debug!(
            before,
            after = self.len(),
            buckets = self.hashtable.len(),
            "collected garbage"
        );
    }

    /// Empties the memoization slots of every node.
    pub(super) fn invalidate_cache(&mut self, quick: bool) {
        for n in self.nodes.iter_mut() {
            n.cache.take();
            if quick {
                n.quick_cache.take();
            }
        }
    }

    fn mask(&self) -> usize {
        self.hashtable.len() - 1
    }

    /// Number of canonical nodes, the leaves excluded.
    pub(super) fn len(&self) -> usize {
        self.nodes.len() - Self::FIRST_NODE - self.free.len()
    }

    /// Capacity of the table; always one less than a power of two.
    pub(super) fn capacity(&self) -> usize {
        self.mask()
    }

    pub(super) fn node_limit(&self) -> usize {
        self.node_limit
    }

    pub(super) fn bytes_total(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<QuadTreeNode>()
            + (self.next.capacity() + self.hashtable.capacity()) * std::mem::size_of::<NodeIdx>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> UniverseConfig {
        UniverseConfig {
            initial_table_log2: 2,
            max_table_log2: 4,
            max_chain_len: 4,
            ..Default::default()
        }
    }

    /// Builds all 16 level-1 nodes.
    fn all_level1(mem: &mut MemoryManager) -> Vec<NodeIdx> {
        (0..16u32)
            .map(|bits| {
                let [nw, ne, sw, se] = [0, 1, 2, 3].map(|i| mem.leaf(bits >> i & 1 != 0));
                mem.find_or_create_node(nw, ne, sw, se).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_canonicalization() {
        let mut mem = MemoryManager::with_config(&UniverseConfig::default());
        let [d, a] = [mem.leaf(false), mem.leaf(true)];
        let x = mem.find_or_create_node(a, d, d, a).unwrap();
        let y = mem.find_or_create_node(a, d, d, a).unwrap();
        let z = mem.find_or_create_node(d, a, a, d).unwrap();
        assert_eq!(x, y);
        assert_ne!(x, z);
        assert_eq!(mem.len(), 2);
        assert_eq!(mem.get(x).level, 1);
        assert_eq!(mem.get(x).population, BigInt::from(2));
    }

    #[test]
    fn test_population_is_sum_of_parts() {
        let mut mem = MemoryManager::with_config(&UniverseConfig::default());
        let level1 = all_level1(&mut mem);
        let level2 = mem
            .find_or_create_node(level1[15], level1[1], level1[6], level1[0])
            .unwrap();
        let n = mem.get(level2);
        let sum = n
            .parts()
            .iter()
            .map(|&x| &mem.get(x).population)
            .sum::<BigInt>();
        assert_eq!(n.population, sum);
        assert_eq!(n.population, BigInt::from(7));
    }

    #[test]
    #[should_panic(expected = "share a level")]
    fn test_mismatched_levels_panic() {
        let mut mem = MemoryManager::with_config(&UniverseConfig::default());
        let d = mem.leaf(false);
        let n = mem.find_or_create_node(d, d, d, d).unwrap();
        let _ = mem.find_or_create_node(n, d, d, d);
    }

    #[test]
    fn test_growth_keeps_indices() {
        let mut mem = MemoryManager::with_config(&small_config());
        let level1 = all_level1(&mut mem);
        assert!(mem.capacity() > 3);
        assert!(mem.gc_pending());
        assert_eq!(all_level1(&mut mem), level1);
        assert_eq!(mem.len(), 16);
    }

    #[test]
    fn test_gc_keeps_reachable_nodes_canonical() {
        let mut mem = MemoryManager::with_config(&UniverseConfig::default());
        let level1 = all_level1(&mut mem);
        let [a, b] = [level1[5], level1[9]];
        let root = mem.find_or_create_node(a, b, b, a).unwrap();
        let _ = mem.get(root).quick_cache.set(level1[3]);

        let mut roots = [root];
        mem.collect_garbage(&mut roots);
        let [root] = roots;
        // root, its two distinct parts and the cached result survive
        assert_eq!(mem.len(), 4);
        assert!(!mem.gc_pending());

        let n = mem.get(root).clone();
        assert_eq!(n.population, BigInt::from(8));
        assert_eq!(mem.get(n.nw).population, BigInt::from(2));
        assert_eq!(mem.get(n.ne).population, BigInt::from(2));
        assert_eq!(n.nw, n.se);
        let cached = *n.quick_cache.get().unwrap();
        assert_eq!(mem.get(cached).population, BigInt::from(2));

        // creating the same combination again yields the surviving instance
        let again = mem.find_or_create_node(n.nw, n.ne, n.sw, n.se).unwrap();
        assert_eq!(again, root);
        let rebuilt = all_level1(&mut mem);
        assert_eq!(rebuilt[5], n.nw);
        assert_eq!(rebuilt[9], n.ne);
        assert_eq!(rebuilt[3], cached);
        assert_eq!(mem.len(), 17);
    }

    #[test]
    fn test_node_limit() {
        let config = UniverseConfig {
            initial_table_log2: 1,
            max_table_log2: 1,
            max_chain_len: 4,
            ..Default::default()
        };
        let mut mem = MemoryManager::with_config(&config);
        assert_eq!(mem.node_limit(), 8);
        let d = mem.leaf(false);
        let a = mem.leaf(true);
        let mut created = 0;
        let err = (0..16u32)
            .map(|bits| {
                let [nw, ne, sw, se] = [0, 1, 2, 3].map(|i| if bits >> i & 1 != 0 { a } else { d });
                mem.find_or_create_node(nw, ne, sw, se)
            })
            .find_map(|r| match r {
                Ok(_) => {
                    created += 1;
                    None
                }
                Err(e) => Some(e),
            })
            .unwrap();
        assert!(matches!(err, UniverseError::ResourceExhausted { limit: 8, .. }));
        assert_eq!(created, 6);
    }

    fn tiny_config() -> UniverseConfig {
        // room for the leaves and six nodes
        UniverseConfig {
            initial_table_log2: 1,
            max_table_log2: 1,
            max_chain_len: 4,
            ..Default::default()
        }
    }

    fn level1(mem: &mut MemoryManager, bits: u32) -> Result<NodeIdx, UniverseError> {
        let [nw, ne, sw, se] = [0, 1, 2, 3].map(|i| mem.leaf(bits >> i & 1 != 0));
        mem.find_or_create_node(nw, ne, sw, se)
    }

    #[test]
    fn test_sweep_keeps_pinned_and_memoized_nodes() {
        let mut mem = MemoryManager::with_config(&tiny_config());
        mem.begin_pinning(&[]);
        let kept = level1(&mut mem, 9).unwrap();

        let mark = mem.pin_mark();
        let scratch: Vec<_> = (1..=5).map(|bits| level1(&mut mem, bits).unwrap()).collect();
        let _ = mem.get(kept).quick_cache.set(scratch[0]);
        mem.unpin_to(mark, scratch[4]);
        assert_eq!(mem.len(), 6);

        // the store is full, so this insertion frees bits 2, 3 and 4
        let fresh = level1(&mut mem, 6).unwrap();
        assert_eq!(mem.len(), 4);
        assert!(mem.gc_pending());
        assert!((fresh.0 as usize) < mem.node_limit());
        assert_eq!(mem.get(fresh).population, BigInt::from(2));

        // survivors did not move and are still found
        assert_eq!(level1(&mut mem, 9).unwrap(), kept);
        assert_eq!(level1(&mut mem, 1).unwrap(), scratch[0]);
        assert_eq!(level1(&mut mem, 5).unwrap(), scratch[4]);
        assert_eq!(*mem.get(kept).quick_cache.get().unwrap(), scratch[0]);
        let again = level1(&mut mem, 2).unwrap();
        assert_eq!(mem.get(again).population, BigInt::from(1));
        assert_eq!(mem.len(), 5);

        mem.end_pinning();
        let mut roots = [kept];
        mem.collect_garbage(&mut roots);
        assert_eq!(mem.len(), 2);
        assert!(!mem.gc_pending());
    }

    #[test]
    fn test_sweep_fails_when_everything_is_pinned() {
        let mut mem = MemoryManager::with_config(&tiny_config());
        mem.begin_pinning(&[]);
        for bits in 1..=6 {
            level1(&mut mem, bits).unwrap();
        }
        let err = level1(&mut mem, 7).unwrap_err();
        assert!(matches!(err, UniverseError::ResourceExhausted { nodes: 6, limit: 8 }));

        // without pinning nothing is swept
        mem.end_pinning();
        mem.collect_garbage(&mut []);
        assert_eq!(mem.len(), 0);
        for bits in 1..=6 {
            level1(&mut mem, bits).unwrap();
        }
        assert!(level1(&mut mem, 7).is_err());
        assert_eq!(mem.len(), 6);
    }

    #[test]
    fn test_invalidate_cache() {
        let mut mem = MemoryManager::with_config(&UniverseConfig::default());
        let level1 = all_level1(&mut mem);
        let root = mem
            .find_or_create_node(level1[1], level1[2], level1[4], level1[8])
            .unwrap();
        let _ = mem.get(root).cache.set(level1[0]);
        let _ = mem.get(root).quick_cache.set(level1[0]);
        mem.invalidate_cache(false);
        assert!(mem.get(root).cache.get().is_none());
        assert!(mem.get(root).quick_cache.get().is_some());
        mem.invalidate_cache(true);
        assert!(mem.get(root).quick_cache.get().is_none());
    }
}
