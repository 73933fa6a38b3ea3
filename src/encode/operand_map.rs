// This module holds the pure mapping functions from mid-IR enumerations to the target
// operand model: execution size, channel offset, register files, data types, predicate
// control, flag references, condition modifiers, source modifiers, region strides and
// widths, accumulator selectors, shared function ids, math function controls and
// immediates. None of them keeps state. A mapping that is total over its input returns the
// target value directly; one whose input space is wider than the target's returns
// EmitResult and reports IllegalOperandEncoding with the operand site that carried the bad
// value, since the mid-IR should never contain it.

//! Operand, region and type mapping.

use crate::core::error::{EmitError, EmitResult, OperandSlot};
use crate::isa::{
    ChannelOffset, ExecSize, FlagModifier, HorzStride, ImmValue, IsaType, MathFc, MathMacroExt,
    PredCtrl, Predication, RegName, RegRef, Region, SfId, SrcModifier, VertStride, Width,
};
use crate::mir::{
    AccSel, ArchReg, CondModifier, DataType, FlagRef, Immediate, MathOp, PredControl, Precision,
    Predicate, RegFile, RegionDesc, Sfid, SrcMod, STRIDE_UNDEFINED,
};

/// Operand site a mapping runs for, used to report defects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub position: u32,
    pub opcode: &'static str,
    pub slot: OperandSlot,
}

impl Site {
    pub fn new(position: u32, opcode: &'static str, slot: OperandSlot) -> Self {
        Self { position, opcode, slot }
    }

    pub fn with_slot(self, slot: OperandSlot) -> Self {
        Self { slot, ..self }
    }

    pub fn illegal(&self, field: &'static str, reason: impl Into<String>) -> EmitError {
        EmitError::IllegalOperandEncoding {
            position: self.position,
            opcode: self.opcode,
            slot: self.slot,
            field,
            reason: reason.into(),
        }
    }
}

pub fn exec_size(site: Site, lanes: u8) -> EmitResult<ExecSize> {
    match lanes {
        1 => Ok(ExecSize::Simd1),
        2 => Ok(ExecSize::Simd2),
        4 => Ok(ExecSize::Simd4),
        8 => Ok(ExecSize::Simd8),
        16 => Ok(ExecSize::Simd16),
        32 => Ok(ExecSize::Simd32),
        n => Err(site.illegal("exec_size", format!("{n} lanes"))),
    }
}

pub fn channel_offset(site: Site, offset: u8) -> EmitResult<ChannelOffset> {
    match offset {
        0 => Ok(ChannelOffset::M0),
        4 => Ok(ChannelOffset::M4),
        8 => Ok(ChannelOffset::M8),
        12 => Ok(ChannelOffset::M12),
        16 => Ok(ChannelOffset::M16),
        20 => Ok(ChannelOffset::M20),
        24 => Ok(ChannelOffset::M24),
        28 => Ok(ChannelOffset::M28),
        n => Err(site.illegal("mask_offset", format!("offset {n}"))),
    }
}

pub fn reg_name(file: RegFile) -> RegName {
    match file {
        RegFile::Grf => RegName::Grf,
        RegFile::Arf(arf) => match arf {
            ArchReg::Null => RegName::ArfNull,
            ArchReg::A0 => RegName::ArfA,
            ArchReg::Acc0 | ArchReg::Acc1 => RegName::ArfAcc,
            ArchReg::Mask0 => RegName::ArfCe,
            ArchReg::Ms0 => RegName::ArfMsg,
            ArchReg::Dbg => RegName::ArfDbg,
            ArchReg::Sr0 => RegName::ArfSr,
            ArchReg::Cr0 => RegName::ArfCr,
            ArchReg::N0 | ArchReg::N1 => RegName::ArfN,
            ArchReg::Ip => RegName::ArfIp,
            ArchReg::F0 | ArchReg::F1 => RegName::ArfF,
            ArchReg::Tm0 => RegName::ArfTm,
            ArchReg::Tdr0 => RegName::ArfTdr,
            ArchReg::Sp => RegName::ArfSp,
        },
    }
}

/// Register number of an operand: architecture registers with several
/// instances (acc1, n1, f1) encode the instance as register number.
pub fn reg_num(file: RegFile, reg: u16) -> u16 {
    match file {
        RegFile::Arf(ArchReg::Acc1 | ArchReg::N1 | ArchReg::F1) => 1,
        RegFile::Arf(_) => 0,
        RegFile::Grf => reg,
    }
}

pub fn data_type(site: Site, ty: DataType) -> EmitResult<IsaType> {
    Ok(match ty {
        DataType::UB => IsaType::UB,
        DataType::B => IsaType::B,
        DataType::UW => IsaType::UW,
        DataType::W => IsaType::W,
        DataType::UD => IsaType::UD,
        DataType::D => IsaType::D,
        DataType::UQ => IsaType::UQ,
        DataType::Q => IsaType::Q,
        DataType::HF => IsaType::HF,
        DataType::F => IsaType::F,
        DataType::DF => IsaType::DF,
        DataType::UV => IsaType::UV,
        DataType::V => IsaType::V,
        DataType::VF => IsaType::VF,
        DataType::NF => IsaType::NF,
        DataType::BF => IsaType::BF,
        DataType::Undef => return Err(site.illegal("type", "undefined type")),
    })
}

pub fn pred_ctrl(control: PredControl) -> PredCtrl {
    match control {
        PredControl::Default => PredCtrl::Seq,
        PredControl::Any2h => PredCtrl::Any2h,
        PredControl::Any4h => PredCtrl::Any4h,
        PredControl::Any8h => PredCtrl::Any8h,
        PredControl::Any16h => PredCtrl::Any16h,
        PredControl::Any32h => PredCtrl::Any32h,
        PredControl::All2h => PredCtrl::All2h,
        PredControl::All4h => PredCtrl::All4h,
        PredControl::All8h => PredCtrl::All8h,
        PredControl::All16h => PredCtrl::All16h,
        PredControl::All32h => PredCtrl::All32h,
        PredControl::AnyV => PredCtrl::AnyV,
        PredControl::AllV => PredCtrl::AllV,
    }
}

pub fn predication(pred: &Predicate) -> Predication {
    Predication { function: pred_ctrl(pred.control), inverse: pred.inverse }
}

pub fn flag_reg(flag: FlagRef) -> RegRef {
    RegRef::new(flag.reg as u16, flag.sub_reg as u16)
}

pub fn flag_modifier(modifier: CondModifier) -> FlagModifier {
    match modifier {
        CondModifier::Z | CondModifier::E => FlagModifier::Eq,
        CondModifier::Nz | CondModifier::Ne => FlagModifier::Ne,
        CondModifier::G => FlagModifier::Gt,
        CondModifier::Ge => FlagModifier::Ge,
        CondModifier::L => FlagModifier::Lt,
        CondModifier::Le => FlagModifier::Le,
        CondModifier::O | CondModifier::R => FlagModifier::Ov,
        CondModifier::U => FlagModifier::Un,
    }
}

/// Logical not shares the negate encoding.
pub fn src_modifier(modifier: SrcMod) -> SrcModifier {
    match modifier {
        SrcMod::None => SrcModifier::None,
        SrcMod::Neg | SrcMod::Not => SrcModifier::Neg,
        SrcMod::Abs => SrcModifier::Abs,
        SrcMod::NegAbs => SrcModifier::NegAbs,
    }
}

pub fn vert_stride(site: Site, stride: u16) -> EmitResult<VertStride> {
    match stride {
        0 => Ok(VertStride::Vs0),
        1 => Ok(VertStride::Vs1),
        2 => Ok(VertStride::Vs2),
        4 => Ok(VertStride::Vs4),
        8 => Ok(VertStride::Vs8),
        16 => Ok(VertStride::Vs16),
        32 => Ok(VertStride::Vs32),
        STRIDE_UNDEFINED => Ok(VertStride::VxH),
        n => Err(site.illegal("vert_stride", format!("stride {n}"))),
    }
}

pub fn width(site: Site, width: u16) -> EmitResult<Width> {
    match width {
        1 => Ok(Width::W1),
        2 => Ok(Width::W2),
        4 => Ok(Width::W4),
        8 => Ok(Width::W8),
        16 => Ok(Width::W16),
        n => Err(site.illegal("width", format!("width {n}"))),
    }
}

pub fn horz_stride(site: Site, stride: u16) -> EmitResult<HorzStride> {
    match stride {
        0 => Ok(HorzStride::Hs0),
        1 => Ok(HorzStride::Hs1),
        2 => Ok(HorzStride::Hs2),
        4 => Ok(HorzStride::Hs4),
        n => Err(site.illegal("horz_stride", format!("stride {n}"))),
    }
}

pub fn region(site: Site, desc: RegionDesc) -> EmitResult<Region> {
    Ok(Region::new(
        vert_stride(site, desc.vert_stride)?,
        width(site, desc.width)?,
        horz_stride(site, desc.horz_stride)?,
    ))
}

/// Three-source instructions have no width field on sources 0 and 1 and
/// neither vertical stride nor width on source 2. Fields without an
/// encoding are left unspecified and never validated.
pub fn three_src_region(site: Site, desc: RegionDesc, pos: usize) -> EmitResult<Region> {
    let vert = match pos {
        0 | 1 => vert_stride(site, desc.vert_stride)?,
        _ => VertStride::Invalid,
    };
    Ok(Region::new(vert, Width::Invalid, horz_stride(site, desc.horz_stride)?))
}

pub fn math_macro_ext(site: Site, acc: AccSel) -> EmitResult<MathMacroExt> {
    match acc {
        AccSel::NoAcc => Ok(MathMacroExt::NoMme),
        AccSel::Acc2 => Ok(MathMacroExt::Mme0),
        AccSel::Acc3 => Ok(MathMacroExt::Mme1),
        AccSel::Acc4 => Ok(MathMacroExt::Mme2),
        AccSel::Acc5 => Ok(MathMacroExt::Mme3),
        AccSel::Acc6 => Ok(MathMacroExt::Mme4),
        AccSel::Acc7 => Ok(MathMacroExt::Mme5),
        AccSel::Acc8 => Ok(MathMacroExt::Mme6),
        AccSel::Acc9 => Ok(MathMacroExt::Mme7),
        AccSel::Acc0 | AccSel::Acc1 => Err(site.illegal("acc_sel", format!("{acc:?}"))),
    }
}

pub fn sfid(sfid: Sfid) -> SfId {
    match sfid {
        Sfid::Null => SfId::Null,
        Sfid::Sampler => SfId::Sampler,
        Sfid::Gateway => SfId::Gateway,
        Sfid::DpDc2 => SfId::Dc2,
        Sfid::DpWrite => SfId::Rc,
        Sfid::Urb => SfId::Urb,
        Sfid::Spawner => SfId::Ts,
        Sfid::Vme => SfId::Vme,
        Sfid::DpCc => SfId::Dcro,
        Sfid::DpDc0 => SfId::Dc0,
        Sfid::DpPi => SfId::Pixi,
        Sfid::DpDc1 => SfId::Dc1,
        Sfid::Cre => SfId::Cre,
    }
}

pub fn math_fc(op: MathOp) -> MathFc {
    match op {
        MathOp::Inv => MathFc::Inv,
        MathOp::Log => MathFc::Log,
        MathOp::Exp => MathFc::Exp,
        MathOp::Sqrt => MathFc::Sqt,
        MathOp::Rsq => MathFc::Rsqt,
        MathOp::Sin => MathFc::Sin,
        MathOp::Cos => MathFc::Cos,
        MathOp::Fdiv => MathFc::Fdiv,
        MathOp::Pow => MathFc::Pow,
        MathOp::IntDiv => MathFc::Idiv,
        MathOp::IntDivQuot => MathFc::Iqot,
        MathOp::IntDivRem => MathFc::Irem,
        MathOp::Invm => MathFc::Invm,
        MathOp::Rsqrtm => MathFc::Rsqtm,
    }
}

/// Operand type of a systolic source with the given precision.
pub fn precision_type(site: Site, precision: Precision) -> EmitResult<IsaType> {
    Ok(match precision {
        Precision::U1 => IsaType::U1,
        Precision::U2 => IsaType::U2,
        Precision::U4 => IsaType::U4,
        Precision::U8 => IsaType::UB,
        Precision::S2 => IsaType::S2,
        Precision::S4 => IsaType::S4,
        Precision::S8 => IsaType::B,
        Precision::Fp16 => IsaType::HF,
        Precision::Bf16 => IsaType::BF,
        Precision::Undef => return Err(site.illegal("precision", "undefined precision")),
    })
}

/// Immediate in the width its type encodes.
pub fn immediate(site: Site, imm: Immediate) -> EmitResult<ImmValue> {
    let bits = imm.bits;
    Ok(match imm.ty {
        DataType::UB | DataType::UW => ImmValue::U16(bits as u16),
        DataType::B | DataType::W => ImmValue::S16(bits as u16 as i16),
        DataType::UD => ImmValue::U32(bits as u32),
        DataType::D => ImmValue::S32(bits as u32 as i32),
        DataType::UQ => ImmValue::U64(bits),
        DataType::Q => ImmValue::S64(bits as i64),
        DataType::HF => ImmValue::F16(bits as u16),
        DataType::F => ImmValue::F32(bits as u32),
        DataType::DF => ImmValue::F64(bits),
        DataType::UV | DataType::V | DataType::VF => ImmValue::U32(bits as u32),
        ty @ (DataType::NF | DataType::BF | DataType::Undef) => {
            return Err(site.illegal("imm", format!("{ty:?} has no immediate form")))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site {
        Site::new(7, "mov", OperandSlot::Src(0))
    }

    #[test]
    fn exec_sizes_are_total_over_legal_widths() {
        for (lanes, expected) in [(1, 1), (2, 2), (4, 4), (8, 8), (16, 16), (32, 32)] {
            assert_eq!(exec_size(site(), lanes).map(ExecSize::lanes), Ok(expected));
        }
        let err = exec_size(site(), 3).unwrap_err();
        assert!(matches!(err, EmitError::IllegalOperandEncoding { position: 7, field: "exec_size", .. }));
    }

    #[test]
    fn region_encoding_is_pure() {
        let desc = RegionDesc::new(16, 8, 2);
        assert_eq!(region(site(), desc), region(site(), desc));
        assert_eq!(
            region(site(), RegionDesc::new(STRIDE_UNDEFINED, 1, 0)),
            Ok(Region::new(VertStride::VxH, Width::W1, HorzStride::Hs0))
        );
        assert!(region(site(), RegionDesc::new(3, 1, 0)).is_err());
        assert!(region(site(), RegionDesc::new(8, 32, 1)).is_err());
        assert!(region(site(), RegionDesc::new(8, 8, 8)).is_err());
    }

    #[test]
    fn three_source_region_fields() {
        let desc = RegionDesc::new(8, 8, 1);
        assert_eq!(three_src_region(site(), desc, 0).map(|r| r.width), Ok(Width::Invalid));
        assert_eq!(three_src_region(site(), desc, 1).map(|r| r.vert), Ok(VertStride::Vs8));
        let r2 = three_src_region(site(), desc, 2).unwrap();
        assert_eq!((r2.vert, r2.width, r2.horz), (VertStride::Invalid, Width::Invalid, HorzStride::Hs1));

        // Unencoded fields are not checked.
        assert!(three_src_region(site(), RegionDesc::new(8, 32, 1), 0).is_ok());
        assert!(three_src_region(site(), RegionDesc::new(3, 3, 1), 2).is_ok());
        assert!(three_src_region(site(), RegionDesc::new(3, 3, 1), 1).is_err());
        assert!(three_src_region(site(), RegionDesc::new(0, 1, 8), 2).is_err());
    }

    #[test]
    fn modifiers_and_conditions() {
        assert_eq!(src_modifier(SrcMod::Not), SrcModifier::Neg);
        assert_eq!(flag_modifier(CondModifier::Z), FlagModifier::Eq);
        assert_eq!(flag_modifier(CondModifier::R), FlagModifier::Ov);
        assert_eq!(pred_ctrl(PredControl::Default), PredCtrl::Seq);
        assert_eq!(channel_offset(site(), 28), Ok(ChannelOffset::M28));
        assert!(channel_offset(site(), 6).is_err());
    }

    #[test]
    fn accumulator_selectors() {
        assert_eq!(math_macro_ext(site(), AccSel::Acc9), Ok(MathMacroExt::Mme7));
        assert_eq!(math_macro_ext(site(), AccSel::NoAcc), Ok(MathMacroExt::NoMme));
        assert!(math_macro_ext(site(), AccSel::Acc0).is_err());
    }

    #[test]
    fn immediate_kinds() {
        let imm = |bits, ty| Immediate { bits, ty };
        assert_eq!(immediate(site(), imm(0xFFFF, DataType::W)), Ok(ImmValue::S16(-1)));
        assert_eq!(immediate(site(), imm(0x3F80_0000, DataType::F)), Ok(ImmValue::F32(0x3F80_0000)));
        assert_eq!(immediate(site(), imm(0x1234_5678, DataType::V)), Ok(ImmValue::U32(0x1234_5678)));
        assert!(immediate(site(), imm(0, DataType::BF)).is_err());
    }

    #[test]
    fn arch_register_instances() {
        assert_eq!(reg_name(RegFile::Arf(ArchReg::Acc1)), RegName::ArfAcc);
        assert_eq!(reg_num(RegFile::Arf(ArchReg::F1), 0), 1);
        assert_eq!(reg_num(RegFile::Grf, 42), 42);
        assert_eq!(data_type(site(), DataType::Undef).map_err(|_| ()), Err(()));
    }

    #[test]
    fn systolic_precisions() {
        assert_eq!(precision_type(site(), Precision::S8), Ok(IsaType::B));
        assert_eq!(precision_type(site(), Precision::U4), Ok(IsaType::U4));
        assert!(precision_type(site(), Precision::Undef).is_err());
    }
}
