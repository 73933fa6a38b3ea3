//! Label to block linkage for one instruction stream.
//!
//! Blocks live in the backend and are referenced by index; the linker only
//! stores the label map. The first reference to a label creates its block,
//! whether that reference is a forward branch or the label itself.
//! Anonymous fallthrough blocks are never entered into the map.

use hashbrown::HashMap;
use log::trace;

use crate::isa::{BlockId, IsaBackend};
use crate::mir::LabelId;

#[derive(Debug, Default)]
pub struct BlockLinker {
    labels: HashMap<LabelId, BlockId>,
    anonymous: usize,
}

impl BlockLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block of `label`, created on first use.
    pub fn resolve<B: IsaBackend>(&mut self, backend: &mut B, label: LabelId) -> BlockId {
        *self.labels.entry(label).or_insert_with(|| {
            let block = backend.create_block();
            trace!("label L{} -> block {}", label.0, block.0);
            block
        })
    }

    /// Fresh block owned by no label.
    pub fn new_anonymous<B: IsaBackend>(&mut self, backend: &mut B) -> BlockId {
        self.anonymous += 1;
        backend.create_block()
    }

    pub fn lookup(&self, label: LabelId) -> Option<BlockId> {
        self.labels.get(&label).copied()
    }

    /// Whether some label maps to `block`.
    pub fn is_labeled(&self, block: BlockId) -> bool {
        self.labels.values().any(|b| *b == block)
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn anonymous_count(&self) -> usize {
        self.anonymous
    }
}
