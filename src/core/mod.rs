// This module collects the infrastructure the encoder is built on: the error taxonomy, the
// platform identifiers with their feature matrix, the caller-facing encoder options and the
// arena-backed emission session with its statistics. None of it knows about individual
// instructions.

//! Core encoder infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - Five fatal error kinds, each carrying position, opcode and operand slot
//!
//! ## Platforms (`platform`)
//! - Release-ordered platform ids and encoding generations
//! - Feature matrix resolved once per platform
//!
//! ## Options (`options`)
//! - Compaction, scoreboard insertion, bindless format, debugger reservation
//!
//! ## Session (`session`)
//! - Arena-based storage of encoded binaries using `bumpalo`
//! - Per-session emission statistics

pub mod error;
pub mod options;
pub mod platform;
pub mod session;
pub mod test_utils;

pub use error::{EmitError, EmitResult, OperandSlot};
pub use options::EncoderOptions;
pub use platform::{Platform, PlatformFeatures, PlatformGen, SwsbEncodeMode};
pub use session::{EmitSession, EmitStats};
