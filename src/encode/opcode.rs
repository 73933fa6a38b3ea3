// This module resolves a mid-IR opcode into the target opcode and its subfunction for one
// platform. The table is a match over the closed Opcode enum; platform generation only
// decides between two encodings of the same operation (wait vs. sync.bar, split vs. unified
// send, call vs. register-sourced calla). Opcodes without a rule (do, pseudo_exit, mulh,
// madw, intrinsics, labels) and ops the selected platform does not encode at all fail with
// UnsupportedOpcode in strict mode. Permissive mode answers None instead, which the
// capability queries at the bottom of the file use to query an instruction without failing.

//! Opcode and subfunction resolution.

use crate::core::error::{EmitError, EmitResult, OperandSlot};
use crate::core::platform::{PlatformFeatures, PlatformGen};
use crate::isa::{Op, SfId, Subfunction, SyncFc};
use crate::mir::{ArchReg, Instruction, Opcode, Operand, RegFile};

use super::operand_map::{self, Site};

/// Target opcode with its refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOp {
    pub op: Op,
    pub subfunction: Subfunction,
}

impl ResolvedOp {
    fn plain(op: Op) -> Self {
        Self { op, subfunction: Subfunction::None }
    }
}

/// Resolve the target opcode of `inst`.
///
/// With `allow_unknown` an opcode without a rule yields `Ok(None)`;
/// otherwise it is `UnsupportedOpcode`. Malformed function controls are
/// reported either way.
pub fn resolve_opcode(
    inst: &Instruction,
    features: &PlatformFeatures,
    allow_unknown: bool,
) -> EmitResult<Option<ResolvedOp>> {
    let unsupported = || -> EmitResult<Option<ResolvedOp>> {
        if allow_unknown {
            Ok(None)
        } else {
            Err(EmitError::UnsupportedOpcode {
                position: inst.position,
                opcode: inst.opcode.name(),
                platform: features.platform.name(),
            })
        }
    };
    let site = Site::new(inst.position, inst.opcode.name(), OperandSlot::Inst);
    let xe = features.generation >= PlatformGen::Xe;

    let resolved = match inst.opcode {
        Opcode::Illegal => ResolvedOp::plain(Op::Illegal),
        Opcode::Mov => ResolvedOp::plain(Op::Mov),
        Opcode::Sel => ResolvedOp::plain(Op::Sel),
        Opcode::Movi => ResolvedOp::plain(Op::Movi),
        Opcode::Not | Opcode::PseudoNot => ResolvedOp::plain(Op::Not),
        Opcode::And | Opcode::PseudoAnd => ResolvedOp::plain(Op::And),
        Opcode::Or | Opcode::PseudoOr => ResolvedOp::plain(Op::Or),
        Opcode::Xor | Opcode::PseudoXor => ResolvedOp::plain(Op::Xor),
        Opcode::Shr => ResolvedOp::plain(Op::Shr),
        Opcode::Shl => ResolvedOp::plain(Op::Shl),
        Opcode::Smov => ResolvedOp::plain(Op::Smov),
        Opcode::Asr => ResolvedOp::plain(Op::Asr),
        Opcode::Ror => ResolvedOp::plain(Op::Ror),
        Opcode::Rol => ResolvedOp::plain(Op::Rol),
        Opcode::Cmp => ResolvedOp::plain(Op::Cmp),
        Opcode::Cmpn => ResolvedOp::plain(Op::Cmpn),
        Opcode::Csel => ResolvedOp::plain(Op::Csel),
        Opcode::Bfrev => ResolvedOp::plain(Op::Bfrev),
        Opcode::Bfe => ResolvedOp::plain(Op::Bfe),
        Opcode::Bfi1 => ResolvedOp::plain(Op::Bfi1),
        Opcode::Bfi2 => ResolvedOp::plain(Op::Bfi2),
        Opcode::Jmpi => ResolvedOp::plain(Op::Jmpi),
        Opcode::Brd => ResolvedOp::plain(Op::Brd),
        Opcode::If => ResolvedOp::plain(Op::If),
        Opcode::Brc => ResolvedOp::plain(Op::Brc),
        Opcode::Else => ResolvedOp::plain(Op::Else),
        Opcode::Endif => ResolvedOp::plain(Op::Endif),
        Opcode::While => ResolvedOp::plain(Op::While),
        Opcode::Break => ResolvedOp::plain(Op::Break),
        Opcode::Cont => ResolvedOp::plain(Op::Cont),
        Opcode::Halt => ResolvedOp::plain(Op::Halt),
        Opcode::Call if features.supports_calla_reg_src && calls_through_register(inst) => {
            ResolvedOp::plain(Op::Calla)
        }
        Opcode::Call | Opcode::PseudoFcall | Opcode::PseudoFcCall => ResolvedOp::plain(Op::Call),
        Opcode::Return | Opcode::PseudoFret | Opcode::PseudoFcRet => ResolvedOp::plain(Op::Ret),
        Opcode::Goto => ResolvedOp::plain(Op::Goto),
        Opcode::Join => ResolvedOp::plain(Op::Join),
        Opcode::Wait if xe => ResolvedOp { op: Op::Sync, subfunction: Subfunction::Sync(SyncFc::Bar) },
        Opcode::Wait => ResolvedOp::plain(Op::Wait),
        Opcode::Send | Opcode::Sendc | Opcode::Sends | Opcode::Sendsc => {
            let op = match (inst.opcode, xe) {
                (Opcode::Send | Opcode::Sends, true) | (Opcode::Send, false) => Op::Send,
                (Opcode::Sendc | Opcode::Sendsc, true) | (Opcode::Sendc, false) => Op::Sendc,
                (Opcode::Sends, false) => Op::Sends,
                _ => Op::Sendsc,
            };
            let sfid = inst.msg.map(|m| operand_map::sfid(m.sfid)).unwrap_or(SfId::Null);
            ResolvedOp { op, subfunction: Subfunction::Send(sfid) }
        }
        Opcode::Math => {
            let Some(fc) = inst.math else {
                return Err(site.illegal("math_fc", "math without function control"));
            };
            ResolvedOp { op: Op::Math, subfunction: Subfunction::Math(operand_map::math_fc(fc)) }
        }
        Opcode::Add => ResolvedOp::plain(Op::Add),
        Opcode::Mul => ResolvedOp::plain(Op::Mul),
        Opcode::Avg => ResolvedOp::plain(Op::Avg),
        Opcode::Frc => ResolvedOp::plain(Op::Frc),
        Opcode::Rndu => ResolvedOp::plain(Op::Rndu),
        Opcode::Rndd => ResolvedOp::plain(Op::Rndd),
        Opcode::Rnde => ResolvedOp::plain(Op::Rnde),
        Opcode::Rndz => ResolvedOp::plain(Op::Rndz),
        Opcode::Mac => ResolvedOp::plain(Op::Mac),
        Opcode::Mach => ResolvedOp::plain(Op::Mach),
        Opcode::Lzd => ResolvedOp::plain(Op::Lzd),
        Opcode::Fbh => ResolvedOp::plain(Op::Fbh),
        Opcode::Fbl => ResolvedOp::plain(Op::Fbl),
        Opcode::Cbit => ResolvedOp::plain(Op::Cbit),
        Opcode::Addc => ResolvedOp::plain(Op::Addc),
        Opcode::Subb => ResolvedOp::plain(Op::Subb),
        Opcode::Sad2 => ResolvedOp::plain(Op::Sad2),
        Opcode::Sada2 | Opcode::PseudoSada2 => ResolvedOp::plain(Op::Sada2),
        Opcode::Dp4 => ResolvedOp::plain(Op::Dp4),
        Opcode::Dph => ResolvedOp::plain(Op::Dph),
        Opcode::Dp3 => ResolvedOp::plain(Op::Dp3),
        Opcode::Dp2 => ResolvedOp::plain(Op::Dp2),
        Opcode::Dp4a => ResolvedOp::plain(Op::Dp4a),
        Opcode::Dpas | Opcode::Dpasw => {
            let op = if inst.opcode == Opcode::Dpas { Op::Dpas } else { Op::Dpasw };
            let Some(info) = inst.dpas else {
                return Err(site.illegal("dpas", "systolic instruction without depth/repeat"));
            };
            let depth = info.systolic_depth;
            if !matches!(depth, 1 | 2 | 4 | 8) {
                return Err(site.illegal("dpas", format!("systolic depth {depth}")));
            }
            let repeat = info.repeat_count;
            if !(1..=8).contains(&repeat) {
                return Err(site.illegal("dpas", format!("repeat count {repeat}")));
            }
            ResolvedOp { op, subfunction: Subfunction::Dpas { depth, repeat } }
        }
        Opcode::Add3 => ResolvedOp::plain(Op::Add3),
        Opcode::Bfn => ResolvedOp { op: Op::Bfn, subfunction: Subfunction::Bfn(inst.bfn_ctrl) },
        Opcode::Line => ResolvedOp::plain(Op::Line),
        Opcode::Pln => ResolvedOp::plain(Op::Pln),
        Opcode::Mad | Opcode::PseudoMad => ResolvedOp::plain(Op::Mad),
        Opcode::Lrp => ResolvedOp::plain(Op::Lrp),
        Opcode::Madm => ResolvedOp::plain(Op::Madm),
        Opcode::Nop => ResolvedOp::plain(Op::Nop),
        Opcode::SyncNop => ResolvedOp { op: Op::Sync, subfunction: Subfunction::Sync(SyncFc::Nop) },
        Opcode::SyncAllrd => {
            ResolvedOp { op: Op::Sync, subfunction: Subfunction::Sync(SyncFc::AllRd) }
        }
        Opcode::SyncAllwr => {
            ResolvedOp { op: Op::Sync, subfunction: Subfunction::Sync(SyncFc::AllWr) }
        }
        Opcode::Label
        | Opcode::Do
        | Opcode::PseudoExit
        | Opcode::Intrinsic
        | Opcode::Mulh
        | Opcode::Madw => return unsupported(),
    };

    if !resolved.op.valid_on(features.platform) {
        return unsupported();
    }
    Ok(Some(resolved))
}

/// `call` whose target sits in a GRF or the address register.
fn calls_through_register(inst: &Instruction) -> bool {
    match inst.srcs.first() {
        Some(Operand::Reg(src)) => {
            matches!(src.file, RegFile::Grf | RegFile::Arf(ArchReg::A0))
        }
        _ => false,
    }
}

/// Whether the resolved op of `inst` can saturate its destination.
pub fn inst_supports_saturation(inst: &Instruction, features: &PlatformFeatures) -> bool {
    matches!(
        resolve_opcode(inst, features, true),
        Ok(Some(r)) if r.op.supports_saturation()
    )
}

/// Whether the resolved op of `inst` accepts source modifiers.
pub fn inst_supports_src_modifier(inst: &Instruction, features: &PlatformFeatures) -> bool {
    matches!(
        resolve_opcode(inst, features, true),
        Ok(Some(r)) if r.op.supports_source_modifiers()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;
    use crate::isa::MathFc;
    use crate::mir::{DataType, MathOp, RegionDesc, SrcRegion};

    fn resolve(inst: &Instruction, platform: Platform) -> EmitResult<Option<ResolvedOp>> {
        resolve_opcode(inst, &platform.features(), false)
    }

    #[test]
    fn pseudo_opcodes_fold_into_real_ones() {
        for (pseudo, op) in [
            (Opcode::PseudoMad, Op::Mad),
            (Opcode::PseudoAnd, Op::And),
            (Opcode::PseudoNot, Op::Not),
            (Opcode::PseudoFret, Op::Ret),
            (Opcode::PseudoFcCall, Op::Call),
        ] {
            let inst = Instruction::new(pseudo, 8);
            assert_eq!(resolve(&inst, Platform::Skl).unwrap().map(|r| r.op), Some(op));
        }
    }

    #[test]
    fn wait_depends_on_generation() {
        let inst = Instruction::new(Opcode::Wait, 1);
        assert_eq!(resolve(&inst, Platform::Skl).unwrap().map(|r| r.op), Some(Op::Wait));
        let xe = resolve(&inst, Platform::Tgllp).unwrap().unwrap();
        assert_eq!((xe.op, xe.subfunction), (Op::Sync, Subfunction::Sync(SyncFc::Bar)));
    }

    #[test]
    fn register_call_becomes_calla_where_supported() {
        let inst = Instruction::new(Opcode::Call, 1)
            .with_src(SrcRegion::grf(20, 0, RegionDesc::scalar(), DataType::D));
        assert_eq!(resolve(&inst, Platform::Tgllp).unwrap().map(|r| r.op), Some(Op::Call));
        assert_eq!(resolve(&inst, Platform::XeHpSdv).unwrap().map(|r| r.op), Some(Op::Calla));
    }

    #[test]
    fn unknown_opcode_in_permissive_mode() {
        let inst = Instruction::new(Opcode::Mulh, 8);
        let features = Platform::Tgllp.features();
        assert_eq!(resolve_opcode(&inst, &features, true), Ok(None));
        assert!(matches!(
            resolve_opcode(&inst, &features, false),
            Err(EmitError::UnsupportedOpcode { opcode: "mulh", platform: "tgllp", .. })
        ));
    }

    #[test]
    fn math_function_control() {
        let inst = Instruction::new(Opcode::Math, 8).with_math(MathOp::Invm);
        let r = resolve(&inst, Platform::Skl).unwrap().unwrap();
        assert_eq!(r.subfunction, Subfunction::Math(MathFc::Invm));
        let bare = Instruction::new(Opcode::Math, 8);
        assert!(matches!(
            resolve(&bare, Platform::Skl),
            Err(EmitError::IllegalOperandEncoding { field: "math_fc", .. })
        ));
    }

    #[test]
    fn capability_queries() {
        let features = Platform::Skl.features();
        assert!(inst_supports_saturation(&Instruction::new(Opcode::Add, 8), &features));
        assert!(!inst_supports_saturation(&Instruction::new(Opcode::And, 8), &features));
        assert!(!inst_supports_saturation(&Instruction::new(Opcode::Madw, 8), &features));
        assert!(inst_supports_src_modifier(&Instruction::new(Opcode::Mad, 8), &features));
        assert!(!inst_supports_src_modifier(&Instruction::new(Opcode::Send, 8), &features));
    }
}
