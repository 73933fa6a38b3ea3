// This module defines the error taxonomy of the encoder using the thiserror crate. EmitError
// has exactly five kinds: an opcode with no translation rule on the selected platform, an
// operand/region/type/modifier with no target representation, a predicate and condition
// modifier that disagree on the flag register, a scoreboard annotation the platform cannot
// encode, and a failure inside the external encoding backend. None of them is a user error:
// by the time this stage runs the program already passed legality checks, so every variant
// carries the instruction position and opcode (and the operand slot where relevant) needed
// to track the defect back to an earlier compiler stage. EmitResult<T> is the alias used
// throughout the crate.

//! Error types for the encoder.

use thiserror::Error;

/// Operand slot an encoding error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSlot {
    Dst,
    Src(u8),
    /// Instruction-level field (exec size, predicate, message descriptor, ...).
    Inst,
}

impl std::fmt::Display for OperandSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperandSlot::Dst => write!(f, "dst"),
            OperandSlot::Src(i) => write!(f, "src{i}"),
            OperandSlot::Inst => write!(f, "inst"),
        }
    }
}

/// Main error type for kernel emission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("unsupported opcode {opcode} at position {position} on {platform}")]
    UnsupportedOpcode {
        position: u32,
        opcode: &'static str,
        platform: &'static str,
    },

    #[error("illegal {field} encoding at position {position} ({opcode} {slot}): {reason}")]
    IllegalOperandEncoding {
        position: u32,
        opcode: &'static str,
        slot: OperandSlot,
        field: &'static str,
        reason: String,
    },

    #[error(
        "flag conflict at position {position} ({opcode}): predicate uses f{pred_flag:?}, \
         condition modifier writes f{cond_flag:?}"
    )]
    FlagConflict {
        position: u32,
        opcode: &'static str,
        pred_flag: (u8, u8),
        cond_flag: (u8, u8),
    },

    #[error("invalid dependency encoding at position {position} ({opcode}): {reason}")]
    InvalidDependencyEncoding {
        position: u32,
        opcode: &'static str,
        reason: String,
    },

    #[error("backend encode failure: {reason}")]
    BackendEncodeFailure { reason: String },
}

/// Result type alias for emission.
pub type EmitResult<T> = Result<T, EmitError>;
