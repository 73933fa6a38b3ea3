// This module defines the seam between the translator and the low-level encoding library.
// IsaBackend is the collaborator interface: blocks and instructions are created through it
// and referenced by index handles, the translator fills instructions through
// instruction_mut, and a single encode() call turns the appended block list into a binary
// buffer plus one program-counter offset per instruction. The backend is authoritative for
// legality; BackendError is its own error type, which the serializer wraps.

//! Encoding backend interface.

use thiserror::Error;

use crate::core::error::EmitError;
use crate::core::platform::SwsbEncodeMode;

use super::inst::{BlockId, InstHandle, InstHeader, IsaInstruction};
use super::types::{BranchCtrl, SendDesc};

/// Options of one encode pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendEncodeOptions {
    pub auto_compact: bool,
    pub swsb_mode: SwsbEncodeMode,
    /// Insert register-distance dependencies on un-annotated instructions.
    pub auto_deps: bool,
}

/// Errors reported by an encoding backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("instruction {id}: {reason}")]
    InvalidInstruction { id: u32, reason: String },

    #[error("instruction {id}: {field} value {value:#x} does not fit in {bits} bits")]
    FieldOverflow {
        id: u32,
        field: &'static str,
        value: i64,
        bits: usize,
    },

    #[error("instruction {id}: branch target block {block} was never appended")]
    UnappendedBlock { id: u32, block: u32 },

    #[error("instruction {id}: invalid dependency annotation: {reason}")]
    InvalidDependency { id: u32, reason: String },

    #[error("unknown block {0}")]
    UnknownBlock(u32),

    #[error("unknown instruction handle {0}")]
    UnknownInstruction(u32),
}

impl From<BackendError> for EmitError {
    fn from(err: BackendError) -> Self {
        EmitError::BackendEncodeFailure { reason: err.to_string() }
    }
}

/// Result of one encode pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBinary {
    pub bytes: Vec<u8>,
    /// Program-counter offset per instruction handle; `None` for instructions never appended.
    pub pcs: Vec<Option<u32>>,
    pub compacted: usize,
}

impl EncodedBinary {
    pub fn pc(&self, inst: InstHandle) -> Option<u32> {
        self.pcs.get(inst.0 as usize).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Low-level encoding and compaction library.
pub trait IsaBackend {
    fn create_block(&mut self) -> BlockId;

    /// Append a block to the program; appending a block twice keeps its first position.
    fn append_block(&mut self, block: BlockId);

    fn create_basic_instruction(&mut self, header: InstHeader) -> InstHandle;

    fn create_branch_instruction(&mut self, header: InstHeader, branch_ctrl: BranchCtrl) -> InstHandle;

    fn create_send_instruction(
        &mut self,
        header: InstHeader,
        ex_desc: SendDesc,
        desc: SendDesc,
    ) -> InstHandle;

    fn create_nop(&mut self) -> InstHandle;

    fn create_illegal(&mut self) -> InstHandle;

    fn instruction(&self, inst: InstHandle) -> Option<&IsaInstruction>;

    fn instruction_mut(&mut self, inst: InstHandle) -> Option<&mut IsaInstruction>;

    fn append_instruction(&mut self, block: BlockId, inst: InstHandle) -> Result<(), BackendError>;

    /// Encode every appended block in append order.
    fn encode(&mut self, options: &BackendEncodeOptions) -> Result<EncodedBinary, BackendError>;
}
