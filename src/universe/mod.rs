mod blank;
mod bounds;
mod cells;
mod field;
mod hashlife;
mod memory;
mod node;
mod stepper;

/// The root never shrinks below `2^MIN_ROOT_LEVEL x 2^MIN_ROOT_LEVEL` cells.
const MIN_ROOT_LEVEL: u32 = 3;

/// Approximate memory taken by one node in the store.
pub(crate) const NODE_BYTES: usize =
    std::mem::size_of::<QuadTreeNode>() + 2 * std::mem::size_of::<NodeIdx>();

use blank::BlankNodes;
use memory::MemoryManager;
use node::{NodeIdx, QuadTreeNode};

pub use bounds::Bounds;
pub use hashlife::Universe;
