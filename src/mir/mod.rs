// This module hosts the mid-level IR the encoder consumes: a register-allocated, fully
// scheduled instruction stream produced by the optimizer pipeline. It is a plain data model
// with builder helpers; the optimizer that fills it and the front end that builds it live
// outside this crate.

//! Mid-IR input model.

pub mod inst;
pub mod kernel;
pub mod operand;

pub use inst::{
    CfInfo, CondMod, CondModifier, DistanceType, DpasInfo, FlagRef, InstOpts, Instruction,
    LabelId, LoweringPhase, MathOp, MsgDesc, Opcode, PredControl, Precision, Predicate,
    SbToken, Sfid, SkipPoint, SwsbAnnotation, TokenKind,
};
pub use kernel::{Kernel, MirBlock, PrologueFlags};
pub use operand::{
    AccSel, Addressing, ArchReg, DataType, DstRegion, Immediate, Operand, RegFile, RegionDesc,
    SrcMod, SrcRegion, STRIDE_UNDEFINED,
};
