use crate::Rule;
use thiserror::Error;

/// Failures reported by [`crate::Universe`].
///
/// Ordinary inputs never fail: an empty field is an empty universe and queries
/// outside the addressable range read as dead. What remains are malformed
/// arguments and running out of node storage.
#[derive(Debug, Error)]
pub enum UniverseError {
    /// The node store reached its hard ceiling. The universe keeps the state
    /// it had before the failing call.
    #[error("node store exhausted: {nodes} canonical nodes reached the limit of {limit}")]
    ResourceExhausted { nodes: usize, limit: usize },

    #[error("coordinate lists differ in length: {xs} x-values and {ys} y-values")]
    MismatchedCoordinates { xs: usize, ys: usize },

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// Birth on zero neighbours would turn the empty background alive.
    #[error("rule {0} is not supported: birth on 0 neighbours")]
    UnsupportedRule(Rule),
}
