//! Mid-IR kernel: an ordered list of basic blocks forming one instruction stream.
//!
//! Program positions are assigned by the kernel as instructions are pushed and
//! can be reassigned with [`Kernel::assign_positions`] after a pass inserts
//! instructions.

use super::inst::{Instruction, LabelId, Opcode};

/// Payload prologues a kernel may start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrologueFlags {
    pub per_thread_payload: bool,
    pub cross_thread_payload: bool,
    pub compute_ffid: bool,
}

impl PrologueFlags {
    pub fn any(&self) -> bool {
        self.per_thread_payload || self.cross_thread_payload || self.compute_ffid
    }
}

/// Basic block of the mid-IR.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirBlock {
    pub insts: Vec<Instruction>,
}

/// One kernel or function body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kernel {
    pub name: String,
    pub blocks: Vec<MirBlock>,
    pub prologue: PrologueFlags,
    next_position: u32,
    next_label: u32,
}

impl Kernel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Allocate a fresh label id.
    pub fn new_label(&mut self) -> LabelId {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        id
    }

    /// Start a new block and return its index.
    pub fn add_block(&mut self) -> usize {
        self.blocks.push(MirBlock::default());
        self.blocks.len() - 1
    }

    /// Start a new block beginning with `label`.
    pub fn add_labeled_block(&mut self, label: LabelId) -> usize {
        let idx = self.add_block();
        self.push(idx, Instruction::label(label));
        idx
    }

    /// Append an instruction to a block, assigning the next program position.
    pub fn push(&mut self, block: usize, mut inst: Instruction) {
        inst.position = self.next_position;
        self.next_position += 1;
        self.blocks[block].insts.push(inst);
    }

    /// Renumber program positions in emission order.
    pub fn assign_positions(&mut self) {
        let mut pos = 0;
        for inst in self.blocks.iter_mut().flat_map(|b| b.insts.iter_mut()) {
            inst.position = pos;
            pos += 1;
        }
        self.next_position = pos;
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.insts.iter())
    }

    pub fn first_inst_is_label(&self) -> bool {
        self.instructions().next().is_some_and(|i| i.opcode == Opcode::Label)
    }

    /// Instruction at the given program position.
    pub fn find(&self, position: u32) -> Option<&Instruction> {
        self.instructions().find(|i| i.position == position)
    }
}
