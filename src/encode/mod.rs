// This module hosts the final code generation stage: the operand / region / type mapper,
// opcode resolution, the send descriptor encoder, the software scoreboard encoder, the
// control-flow block linker, the instruction translator and the serializer, plus the
// emitter that drives them over one kernel. Everything here is single-threaded per kernel;
// parallel emission uses one emitter, session and backend per kernel.

//! Mid-IR to target instruction encoding.

pub mod block_linker;
pub mod emitter;
pub mod opcode;
pub mod operand_map;
pub mod send_desc;
pub mod serializer;
pub mod swsb;
pub mod translator;

pub use block_linker::BlockLinker;
pub use emitter::{encode_kernel, is_encoder_intrinsic, KernelEmitter};
pub use opcode::{inst_supports_saturation, inst_supports_src_modifier, resolve_opcode, ResolvedOp};
pub use send_desc::{encode_send_descriptors, SendDescriptors};
pub use serializer::{EncodedKernel, JitInfo, Serializer, DEBUG_RESERVATION_SLOTS, PROLOGUE_ALIGNMENT};
pub use swsb::encode_swsb;
pub use translator::{Translated, Translator};
