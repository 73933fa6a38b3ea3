// This module defines the target opcodes and their subfunctions (shared-function id for
// sends, math function control, sync function control, systolic depth and repeat count for
// dpas, boolean function control for bfn) together with the per-op properties the encoder
// consults: whether an op branches, is a send, carries a destination, accepts predication,
// a flag modifier, saturation or source modifiers, is a macro, which scoreboard instruction
// class it belongs to, and on which platforms it exists at all.

//! Target opcodes.

use crate::core::platform::{Platform, PlatformGen};

use super::swsb::InstType;

/// Target opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Illegal,
    Mov,
    Sel,
    Movi,
    Not,
    And,
    Or,
    Xor,
    Shr,
    Shl,
    Smov,
    Asr,
    Ror,
    Rol,
    Cmp,
    Cmpn,
    Csel,
    Bfrev,
    Bfe,
    Bfi1,
    Bfi2,
    Jmpi,
    Brd,
    If,
    Brc,
    Else,
    Endif,
    While,
    Break,
    Cont,
    Halt,
    Calla,
    Call,
    Ret,
    Goto,
    Join,
    Wait,
    Send,
    Sendc,
    Sends,
    Sendsc,
    Math,
    Add,
    Mul,
    Avg,
    Frc,
    Rndu,
    Rndd,
    Rnde,
    Rndz,
    Mac,
    Mach,
    Lzd,
    Fbh,
    Fbl,
    Cbit,
    Addc,
    Subb,
    Sad2,
    Sada2,
    Dp4,
    Dph,
    Dp3,
    Dp2,
    Dp4a,
    Dpas,
    Dpasw,
    Add3,
    Bfn,
    Line,
    Pln,
    Mad,
    Lrp,
    Madm,
    Nop,
    Sync,
}

impl Op {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Illegal => "illegal",
            Op::Mov => "mov",
            Op::Sel => "sel",
            Op::Movi => "movi",
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Shr => "shr",
            Op::Shl => "shl",
            Op::Smov => "smov",
            Op::Asr => "asr",
            Op::Ror => "ror",
            Op::Rol => "rol",
            Op::Cmp => "cmp",
            Op::Cmpn => "cmpn",
            Op::Csel => "csel",
            Op::Bfrev => "bfrev",
            Op::Bfe => "bfe",
            Op::Bfi1 => "bfi1",
            Op::Bfi2 => "bfi2",
            Op::Jmpi => "jmpi",
            Op::Brd => "brd",
            Op::If => "if",
            Op::Brc => "brc",
            Op::Else => "else",
            Op::Endif => "endif",
            Op::While => "while",
            Op::Break => "break",
            Op::Cont => "cont",
            Op::Halt => "halt",
            Op::Calla => "calla",
            Op::Call => "call",
            Op::Ret => "ret",
            Op::Goto => "goto",
            Op::Join => "join",
            Op::Wait => "wait",
            Op::Send => "send",
            Op::Sendc => "sendc",
            Op::Sends => "sends",
            Op::Sendsc => "sendsc",
            Op::Math => "math",
            Op::Add => "add",
            Op::Mul => "mul",
            Op::Avg => "avg",
            Op::Frc => "frc",
            Op::Rndu => "rndu",
            Op::Rndd => "rndd",
            Op::Rnde => "rnde",
            Op::Rndz => "rndz",
            Op::Mac => "mac",
            Op::Mach => "mach",
            Op::Lzd => "lzd",
            Op::Fbh => "fbh",
            Op::Fbl => "fbl",
            Op::Cbit => "cbit",
            Op::Addc => "addc",
            Op::Subb => "subb",
            Op::Sad2 => "sad2",
            Op::Sada2 => "sada2",
            Op::Dp4 => "dp4",
            Op::Dph => "dph",
            Op::Dp3 => "dp3",
            Op::Dp2 => "dp2",
            Op::Dp4a => "dp4a",
            Op::Dpas => "dpas",
            Op::Dpasw => "dpasw",
            Op::Add3 => "add3",
            Op::Bfn => "bfn",
            Op::Line => "line",
            Op::Pln => "pln",
            Op::Mad => "mad",
            Op::Lrp => "lrp",
            Op::Madm => "madm",
            Op::Nop => "nop",
            Op::Sync => "sync",
        }
    }

    /// 7-bit opcode field value.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_branching(self) -> bool {
        matches!(
            self,
            Op::Jmpi
                | Op::Brd
                | Op::If
                | Op::Brc
                | Op::Else
                | Op::Endif
                | Op::While
                | Op::Break
                | Op::Cont
                | Op::Halt
                | Op::Calla
                | Op::Call
                | Op::Ret
                | Op::Goto
                | Op::Join
        )
    }

    pub fn is_send_family(self) -> bool {
        matches!(self, Op::Send | Op::Sendc | Op::Sends | Op::Sendsc)
    }

    pub fn is_split_send(self) -> bool {
        matches!(self, Op::Sends | Op::Sendsc)
    }

    pub fn is_ternary(self) -> bool {
        matches!(
            self,
            Op::Csel
                | Op::Bfe
                | Op::Bfi2
                | Op::Dpas
                | Op::Dpasw
                | Op::Add3
                | Op::Bfn
                | Op::Mad
                | Op::Lrp
                | Op::Madm
        )
    }

    pub fn supports_destination(self) -> bool {
        match self {
            Op::Call | Op::Calla => true,
            Op::Nop | Op::Illegal | Op::Sync | Op::Wait => false,
            op => !op.is_branching(),
        }
    }

    pub fn supports_predication(self) -> bool {
        !matches!(self, Op::Nop | Op::Illegal | Op::Wait | Op::Endif | Op::Sync)
    }

    pub fn supports_flag_modifier(self) -> bool {
        !self.is_branching()
            && !self.is_send_family()
            && !matches!(
                self,
                Op::Nop
                    | Op::Illegal
                    | Op::Wait
                    | Op::Sync
                    | Op::Math
                    | Op::Movi
                    | Op::Smov
                    | Op::Dpas
                    | Op::Dpasw
                    | Op::Madm
            )
    }

    pub fn supports_saturation(self) -> bool {
        !self.is_branching()
            && !self.is_send_family()
            && !matches!(
                self,
                Op::Nop
                    | Op::Illegal
                    | Op::Wait
                    | Op::Sync
                    | Op::Not
                    | Op::And
                    | Op::Or
                    | Op::Xor
                    | Op::Shl
                    | Op::Shr
                    | Op::Asr
                    | Op::Ror
                    | Op::Rol
                    | Op::Bfrev
                    | Op::Bfe
                    | Op::Bfi1
                    | Op::Bfi2
                    | Op::Bfn
                    | Op::Fbh
                    | Op::Fbl
                    | Op::Cbit
                    | Op::Lzd
                    | Op::Smov
                    | Op::Movi
            )
    }

    pub fn supports_source_modifiers(self) -> bool {
        !self.is_branching()
            && !self.is_send_family()
            && !matches!(
                self,
                Op::Nop
                    | Op::Illegal
                    | Op::Wait
                    | Op::Sync
                    | Op::Movi
                    | Op::Smov
                    | Op::Bfrev
                    | Op::Bfe
                    | Op::Bfi1
                    | Op::Bfi2
                    | Op::Bfn
                    | Op::Dpas
                    | Op::Dpasw
            )
    }

    /// Scoreboard instruction class.
    pub fn inst_type(self) -> InstType {
        match self {
            Op::Math => InstType::Math,
            Op::Dpas | Op::Dpasw => InstType::Dpas,
            op if op.is_send_family() => InstType::Send,
            _ => InstType::Others,
        }
    }

    /// Whether the op exists in the encoding of `platform`.
    pub fn valid_on(self, platform: Platform) -> bool {
        let gen = platform.generation();
        match self {
            Op::Sends | Op::Sendsc | Op::Wait | Op::Sad2 | Op::Sada2 => gen < PlatformGen::Xe,
            Op::Sync | Op::Dp4a => gen >= PlatformGen::Xe,
            Op::Calla | Op::Dpas | Op::Dpasw | Op::Add3 | Op::Bfn => gen >= PlatformGen::XeHp,
            Op::Csel | Op::Ror | Op::Rol => platform >= Platform::Icllp,
            Op::Line | Op::Pln | Op::Dp4 | Op::Dph | Op::Dp3 | Op::Dp2 => gen < PlatformGen::XeHp,
            _ => true,
        }
    }
}

/// Shared function id of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SfId {
    Null,
    Sampler,
    Gateway,
    Dc2,
    Rc,
    Urb,
    Ts,
    Vme,
    Dcro,
    Dc0,
    Pixi,
    Dc1,
    Cre,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFc {
    Inv,
    Log,
    Exp,
    Sqt,
    Rsqt,
    Sin,
    Cos,
    Fdiv,
    Pow,
    Idiv,
    Iqot,
    Irem,
    Invm,
    Rsqtm,
}

impl MathFc {
    pub fn is_macro(self) -> bool {
        matches!(self, MathFc::Invm | MathFc::Rsqtm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncFc {
    Nop,
    AllRd,
    AllWr,
    Bar,
}

/// Opcode refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Subfunction {
    #[default]
    None,
    Send(SfId),
    Math(MathFc),
    Sync(SyncFc),
    Dpas { depth: u8, repeat: u8 },
    Bfn(u8),
}

impl Subfunction {
    /// Field value written into the function control field.
    pub fn code(self) -> u8 {
        match self {
            Subfunction::None => 0,
            Subfunction::Send(sf) => sf as u8,
            Subfunction::Math(fc) => fc as u8 + 1,
            Subfunction::Sync(fc) => fc as u8,
            Subfunction::Dpas { depth, repeat } => {
                ((depth.trailing_zeros() as u8) << 3) | repeat.saturating_sub(1)
            }
            Subfunction::Bfn(ctrl) => ctrl,
        }
    }
}

/// Whether the op with this subfunction is a macro instruction.
pub fn is_macro(op: Op, sf: Subfunction) -> bool {
    match (op, sf) {
        (Op::Madm, _) => true,
        (Op::Math, Subfunction::Math(fc)) => fc.is_macro(),
        _ => false,
    }
}
