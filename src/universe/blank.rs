use super::{MemoryManager, NodeIdx};
use crate::UniverseError;

/// Canonical empty nodes indexed by level, built lazily from the dead leaf.
pub(super) struct BlankNodes {
    data: Vec<NodeIdx>,
}

impl BlankNodes {
    pub(super) fn new() -> Self {
        Self { data: vec![] }
    }

    pub(super) fn get(
        &mut self,
        level: u32,
        mem: &mut MemoryManager,
    ) -> Result<NodeIdx, UniverseError> {
        let v = &mut self.data;
        while v.len() <= level as usize {
            if let Some(&b) = v.last() {
                v.push(mem.find_or_create_node(b, b, b, b)?);
            } else {
                v.push(mem.leaf(false));
            }
        }
        Ok(v[level as usize])
    }

    /// Cached nodes, to be kept alive (and renumbered) by a collection.
    pub(super) fn as_mut_slice(&mut self) -> &mut [NodeIdx] {
        &mut self.data
    }

    pub(super) fn clear(&mut self) {
        self.data.clear();
    }
}
