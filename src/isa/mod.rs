// This module hosts the target side of the encoder: the resolved operand and instruction
// model, the target opcode table with its per-op properties, the software scoreboard
// annotation with its platform validity check, the IsaBackend collaborator interface, and
// the reference backend implementing it.

//! Target instruction set model and encoding backend.

pub mod backend;
pub mod inst;
pub mod op;
pub mod reference;
pub mod swsb;
pub mod types;

pub use backend::{BackendEncodeOptions, BackendError, EncodedBinary, IsaBackend};
pub use inst::{BlockId, Destination, InstHandle, InstHeader, IsaInstruction, Source};
pub use op::{MathFc, Op, SfId, Subfunction, SyncFc};
pub use reference::ReferenceEncoder;
pub use swsb::{DistType, InstType, Swsb, TokenType};
pub use types::{
    BranchCtrl, ChannelOffset, DstModifier, ExecSize, FlagModifier, HorzStride, ImmValue,
    InstOptSet, IsaType, MaskCtrl, MathMacroExt, PredCtrl, Predication, RegName, RegRef, Region,
    SendDesc, SrcModifier, VertStride, Width,
};
