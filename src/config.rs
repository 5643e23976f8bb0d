use crate::Rule;

/// Upper bound for `max_table_log2`: node indices are `u32`.
const TABLE_LOG2_LIMIT: u32 = 30;
/// Lower bound for `max_table_log2`, enough for an empty universe.
const TABLE_LOG2_MIN: u32 = 4;

/// Tuning of a [`crate::Universe`] and its node store.
///
/// The canonicalization table starts with `2^initial_table_log2` buckets and
/// doubles whenever the number of canonical nodes exceeds `buckets * load_factor`,
/// up to `2^max_table_log2` buckets. Past that point chains grow, and once they
/// average `max_chain_len` nodes the store refuses further insertions.
#[derive(Clone, Debug)]
pub struct UniverseConfig {
    pub initial_table_log2: u32,
    pub max_table_log2: u32,
    pub load_factor: f64,
    pub max_chain_len: usize,
    /// Every [`crate::Universe::advance`] moves `2^step_log2` generations forward.
    pub step_log2: u32,
    pub rule: Rule,
}

/// Memory budget of [`UniverseConfig::default`], in MiB.
pub const DEFAULT_MEM_LIMIT_MIB: u32 = 1024;

impl Default for UniverseConfig {
    /// The node store of the default configuration fits in
    /// [`DEFAULT_MEM_LIMIT_MIB`] MiB.
    fn default() -> Self {
        Self::with_mem_limit_mib(DEFAULT_MEM_LIMIT_MIB)
    }
}

impl UniverseConfig {
    /// Everything but the table ceiling.
    fn base() -> Self {
        Self {
            initial_table_log2: 16,
            max_table_log2: TABLE_LOG2_MIN,
            load_factor: 0.9,
            max_chain_len: 8,
            step_log2: 0,
            rule: Rule::conway(),
        }
    }

    /// Sizes the table ceiling so that the node store stays roughly within
    /// `mem_limit_mib` MiB when completely full.
    ///
    /// This is not a hard limit: populations of astronomically large nodes
    /// live on the heap and are not accounted for.
    pub fn with_mem_limit_mib(mem_limit_mib: u32) -> Self {
        let base = Self::base();
        let nodes = ((mem_limit_mib as u64) << 20) / crate::universe::NODE_BYTES as u64;
        let buckets = (nodes / base.max_chain_len as u64).max(2);
        // previous power of two
        let max_table_log2 = buckets.ilog2().clamp(TABLE_LOG2_MIN, TABLE_LOG2_LIMIT);
        Self {
            initial_table_log2: base.initial_table_log2.min(max_table_log2),
            max_table_log2,
            ..base
        }
    }

    /// Maximum number of nodes, leaves included, that a store of this
    /// configuration accepts.
    pub fn node_limit(&self) -> usize {
        (1usize << self.max_table_log2)
            .saturating_mul(self.max_chain_len)
            .min(u32::MAX as usize)
    }

    pub fn with_rule(self, rule: Rule) -> Self {
        Self { rule, ..self }
    }

    pub fn with_step_log2(self, step_log2: u32) -> Self {
        Self { step_log2, ..self }
    }

    /// Clamps every field into its usable range.
    pub(crate) fn sanitized(&self) -> Self {
        let max_table_log2 = self.max_table_log2.clamp(TABLE_LOG2_MIN, TABLE_LOG2_LIMIT);
        let load_factor = if self.load_factor.is_finite() && self.load_factor > 0.0 {
            self.load_factor
        } else {
            Self::base().load_factor
        };
        Self {
            initial_table_log2: self.initial_table_log2.clamp(1, max_table_log2),
            max_table_log2,
            load_factor,
            max_chain_len: self.max_chain_len.max(1),
            ..self.clone()
        }
    }
}
