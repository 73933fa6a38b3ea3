//! genemit - final code generation for GPU kernels.
//!
//! Takes a register-allocated, scheduled mid-level IR kernel and produces the
//! native instruction binary for one hardware platform: opcodes and operands
//! are mapped, send descriptors and scoreboard annotations encoded, labels
//! linked into blocks, and the program serialized through an encoding backend
//! that reports each instruction's program-counter offset.
//!
//! # Primary Usage
//!
//! ```ignore
//! use genemit::{encode_kernel, EmitSession, EncoderOptions, Platform};
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let session = EmitSession::new(&arena);
//! let encoded = encode_kernel(&session, &mut kernel, Platform::Tgllp, EncoderOptions::default())?;
//! println!("{} bytes", encoded.len());
//! ```
//!
//! # Architecture
//!
//! - [`core`] - errors, platforms, options, emission session
//! - [`mir`] - the mid-IR input model
//! - [`isa`] - resolved target instructions and the encoding backend
//! - [`encode`] - translation, linking and serialization

pub mod core;
pub mod encode;
pub mod isa;
pub mod mir;

pub use crate::core::{
    EmitError, EmitResult, EmitSession, EmitStats, EncoderOptions, OperandSlot, Platform,
    PlatformFeatures, PlatformGen,
};
pub use encode::{encode_kernel, EncodedKernel, JitInfo, KernelEmitter};
pub use isa::{IsaBackend, ReferenceEncoder};
