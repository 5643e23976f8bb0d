use super::{BlankNodes, MemoryManager, NodeIdx, QuadTreeNode, MIN_ROOT_LEVEL};
use crate::{rule::RuleTable, Rule, UniverseConfig, UniverseError};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use num_bigint::BigInt;
use tracing::{trace, warn};

/// Implementation of [HashLife algorithm](https://conwaylife.com/wiki/HashLife)
/// for two-state Life-like rules on an unbounded plane.
///
/// The field is a canonical quadtree whose root is centered on the origin: a
/// root of level `L` covers coordinates `-2^(L-1)..2^(L-1)` on both axes, with
/// `x` growing eastwards and `y` growing southwards. Every node is unique in its
/// [`MemoryManager`], so equal subtrees are equal indices and results of
/// advancing them are memoized per node.
///
/// # Example
///
/// ```rust
/// use gol_hashlife::{BigInt, Universe};
///
/// let mut universe = Universe::new();
/// // glider
/// universe.load_field(&[1, 2, 0, 1, 2], &[0, 1, 2, 2, 2], None).unwrap();
/// universe.set_step_exponent(2);
/// universe.advance().unwrap();
/// assert_eq!(*universe.generation(), BigInt::from(4));
/// assert_eq!(*universe.population(), BigInt::from(5));
/// assert!(universe.get_bit(&BigInt::from(2), &BigInt::from(3)));
/// ```
pub struct Universe {
    pub(super) root: NodeIdx,
    pub(super) generation: BigInt,
    pub(super) step_log2: u32,
    /// root and generation to return to
    pub(super) checkpoint: Option<(NodeIdx, BigInt)>,
    pub(super) rules: RuleTable,
    pub(super) mem: MemoryManager,
    pub(super) blank_nodes: BlankNodes,
    /// level-2 nodes by their 4x4 occupancy bitmask
    pub(super) level2_cache: HashMap<u16, NodeIdx>,
}

impl Universe {
    /// Creates an empty universe with the default configuration (B3/S23, one
    /// generation per advance).
    pub fn new() -> Self {
        Self::with_config(UniverseConfig::default())
            .expect("the default configuration holds an empty universe")
    }

    /// Creates an empty universe.
    ///
    /// # Errors
    ///
    /// Fails if the configured rule is unsupported.
    pub fn with_config(config: UniverseConfig) -> Result<Self, UniverseError> {
        let config = config.sanitized();
        if config.rule.births_on_empty() {
            return Err(UniverseError::UnsupportedRule(config.rule));
        }
        let mut universe = Self {
            root: NodeIdx::DEAD,
            generation: BigInt::ZERO,
            step_log2: config.step_log2,
            checkpoint: None,
            rules: RuleTable::new(config.rule),
            mem: MemoryManager::with_config(&config),
            blank_nodes: BlankNodes::new(),
            level2_cache: HashMap::new(),
        };
        universe.root = universe.blank_nodes.get(MIN_ROOT_LEVEL, &mut universe.mem)?;
        Ok(universe)
    }

    /// Empties the universe and resets the generation counter.
    pub fn reset(&mut self) -> Result<(), UniverseError> {
        self.load_field(&[], &[], None)
    }

    /// Advances the universe by `2^step_exponent` generations and returns the
    /// new generation.
    ///
    /// # Errors
    ///
    /// Returns [`UniverseError::ResourceExhausted`] if the node store fills up
    /// with nodes the step still needs. Nodes it no longer needs are freed on
    /// the way. After a failure the universe keeps the state it had before the
    /// call, and retrying with a smaller step exponent may succeed.
    pub fn advance(&mut self) -> Result<BigInt, UniverseError> {
        self.run_pending_gc();
        let roots = self.gc_roots();
        self.mem.begin_pinning(&roots);
        let result = self.advanced_root();
        self.mem.end_pinning();
        match result {
            Ok(root) => {
                self.root = root;
                self.generation += BigInt::from(1) << self.step_log2;
                self.run_pending_gc();
                Ok(self.generation.clone())
            }
            Err(e) => {
                warn!(%e, step_log2 = self.step_log2, "advance aborted");
                self.collect_garbage();
                Err(e)
            }
        }
    }

    fn advanced_root(&mut self) -> Result<NodeIdx, UniverseError> {
        let mut root = self.root;
        while self.needs_expansion(root) {
            root = self.expand_universe(root)?;
        }
        trace!(
            level = self.mem.get(root).level,
            step_log2 = self.step_log2,
            "stepping root"
        );
        let root = self.full_step(root)?;
        self.compact(root)
    }

    /// Whether live cells of `root` could reach its border within one advance.
    fn needs_expansion(&self, root: NodeIdx) -> bool {
        let n = self.mem.get(root);
        // the result is one level below the root
        if n.level <= self.step_log2.saturating_add(2).max(MIN_ROOT_LEVEL) {
            return true;
        }
        // population of the quadrant's innermost great-grandchild
        let innermost = |quadrant: &QuadTreeNode, corner: usize| -> &BigInt {
            let child = self.mem.get(quadrant.parts()[corner]);
            &self.mem.get(child.parts()[corner]).population
        };
        let [nw, ne, sw, se] = n.parts().map(|x| self.mem.get(x));
        nw.population != *innermost(nw, 3)
            || ne.population != *innermost(ne, 2)
            || sw.population != *innermost(sw, 1)
            || se.population != *innermost(se, 0)
    }

    /// Places `node` in the center of a blank node twice as large.
    pub(super) fn expand_universe(&mut self, node: NodeIdx) -> Result<NodeIdx, UniverseError> {
        let n = self.mem.get(node);
        let ([nw, ne, sw, se], level) = (n.parts(), n.level);
        let b = self.blank_nodes.get(level - 1, &mut self.mem)?;
        let nw = self.mem.find_or_create_node(b, b, b, nw)?;
        let ne = self.mem.find_or_create_node(b, b, ne, b)?;
        let sw = self.mem.find_or_create_node(b, sw, b, b)?;
        let se = self.mem.find_or_create_node(se, b, b, b)?;
        self.mem.find_or_create_node(nw, ne, sw, se)
    }

    /// The center of `node`, two times smaller.
    pub(super) fn centered_subnode(&mut self, node: NodeIdx) -> Result<NodeIdx, UniverseError> {
        let [nw, ne, sw, se] = self.mem.get(node).parts().map(|x| self.mem.get(x));
        let [nw, ne, sw, se] = [nw.se, ne.sw, sw.ne, se.nw];
        self.mem.find_or_create_node(nw, ne, sw, se)
    }

    fn has_blank_frame(&self, node: NodeIdx) -> bool {
        let n = self.mem.get(node);
        if n.level <= MIN_ROOT_LEVEL {
            return false;
        }
        let [nw, ne, sw, se] = n.parts().map(|x| self.mem.get(x));
        [
            nw.sw, nw.nw, nw.ne, ne.nw, ne.ne, ne.se, se.ne, se.se, se.sw, sw.se, sw.sw, sw.nw,
        ]
        .iter()
        .all(|&x| self.mem.get(x).is_empty())
    }

    /// Shrinks `root` while its outer ring is blank, so that equal fields get
    /// equal roots.
    pub(super) fn compact(&mut self, mut root: NodeIdx) -> Result<NodeIdx, UniverseError> {
        while self.has_blank_frame(root) {
            root = self.centered_subnode(root)?;
        }
        Ok(root)
    }

    /// Sets the number of generations done by one [`Self::advance`] to
    /// `2^step_log2`.
    pub fn set_step_exponent(&mut self, step_log2: u32) {
        if step_log2 != self.step_log2 {
            self.step_log2 = step_log2;
            self.mem.invalidate_cache(false);
        }
        self.run_pending_gc();
    }

    pub fn step_exponent(&self) -> u32 {
        self.step_log2
    }

    /// Changes the rule. Every memoized result is dropped if the rule differs.
    ///
    /// # Errors
    ///
    /// Rules with birth on 0 neighbours are rejected.
    pub fn set_rule(&mut self, rule: Rule) -> Result<(), UniverseError> {
        if rule.births_on_empty() {
            return Err(UniverseError::UnsupportedRule(rule));
        }
        if self.rules.set_rule(rule) {
            self.mem.invalidate_cache(true);
            self.blank_nodes.clear();
            self.level2_cache.clear();
        }
        self.run_pending_gc();
        Ok(())
    }

    pub fn rule(&self) -> Rule {
        self.rules.rule()
    }

    /// Remembers the current field and generation.
    pub fn save_checkpoint(&mut self) {
        self.checkpoint = Some((self.root, self.generation.clone()));
    }

    /// Returns to the field and generation saved by [`Self::save_checkpoint`].
    /// Returns `false` if there is no checkpoint.
    pub fn restore_checkpoint(&mut self) -> bool {
        self.run_pending_gc();
        let Some((root, generation)) = self.checkpoint.clone() else {
            return false;
        };
        self.root = root;
        self.generation = generation;
        self.collect_garbage();
        true
    }

    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint.is_some()
    }

    pub fn generation(&self) -> &BigInt {
        &self.generation
    }

    pub fn population(&self) -> &BigInt {
        &self.mem.get(self.root).population
    }

    /// Level of the root: the field spans `2^level x 2^level` cells.
    pub fn level(&self) -> u32 {
        self.mem.get(self.root).level
    }

    /// Number of canonical nodes in the store, the two leaves excluded.
    pub fn node_count(&self) -> usize {
        self.mem.len()
    }

    /// Capacity of the canonicalization table; one less than a power of two.
    pub fn table_capacity(&self) -> usize {
        self.mem.capacity()
    }

    /// Canonical nodes per unit of table capacity.
    pub fn table_load(&self) -> f64 {
        self.mem.len() as f64 / self.mem.capacity() as f64
    }

    /// Maximum number of nodes the store accepts.
    pub fn node_limit(&self) -> usize {
        self.mem.node_limit()
    }

    /// Approximate heap memory usage of the node store in bytes.
    pub fn bytes_total(&self) -> usize {
        self.mem.bytes_total()
    }

    /// Number of distinct nodes of every level in the current field.
    pub fn level_distribution(&self) -> Vec<usize> {
        let mut distribution = vec![0; self.level() as usize + 1];
        let mut visited = HashSet::new();
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            let n = self.mem.get(idx);
            distribution[n.level as usize] += 1;
            if !n.is_leaf() {
                stack.extend(n.parts());
            }
        }
        distribution
    }

    /// Frees every node that the field, the checkpoint and the memoized
    /// results do not need.
    pub fn run_gc(&mut self) {
        self.collect_garbage();
    }

    pub(super) fn run_pending_gc(&mut self) {
        if self.mem.gc_pending() {
            self.collect_garbage();
        }
    }

    /// The field, the checkpoint and the blank nodes.
    fn gc_roots(&mut self) -> Vec<NodeIdx> {
        let mut roots = vec![self.root];
        roots.extend(self.checkpoint.as_ref().map(|(idx, _)| *idx));
        roots.extend_from_slice(self.blank_nodes.as_mut_slice());
        roots
    }

    pub(super) fn collect_garbage(&mut self) {
        let mut roots = self.gc_roots();
        self.mem.collect_garbage(&mut roots);

        let mut roots = roots.into_iter();
        self.root = roots.next().unwrap_or(self.root);
        if let Some((idx, _)) = self.checkpoint.as_mut() {
            *idx = roots.next().unwrap_or(*idx);
        }
        for (dst, src) in self.blank_nodes.as_mut_slice().iter_mut().zip(roots) {
            *dst = src;
        }
        // holds indices from before the collection
        self.level2_cache.clear();
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}
