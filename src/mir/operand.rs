// This module defines the operand side of the mid-level IR consumed by the encoder: scalar
// data types, register files (the general register file plus the architecture registers),
// register regions with their vertical stride / width / horizontal stride triple, source
// modifiers, the implicit accumulator selector of macro instructions, and the operand enum
// itself (register region, immediate, label). Register operands arrive fully allocated:
// register number and sub-register offset (in units of the operand type) are already fixed.
// Nothing here knows about the target encoding; the operand mapper owns that translation.

//! Mid-IR operands.

use super::inst::LabelId;

/// Scalar operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    UB,
    B,
    UW,
    W,
    UD,
    D,
    UQ,
    Q,
    HF,
    F,
    DF,
    /// Packed unsigned 4-bit vector immediate.
    UV,
    /// Packed signed 4-bit vector immediate.
    V,
    /// Packed 8-bit restricted float vector immediate.
    VF,
    NF,
    BF,
    /// Type not assigned by an earlier stage.
    Undef,
}

impl DataType {
    /// Size in bytes of one element.
    pub fn size(self) -> u32 {
        match self {
            DataType::UB | DataType::B => 1,
            DataType::UW | DataType::W | DataType::HF | DataType::BF => 2,
            DataType::UD | DataType::D | DataType::F | DataType::UV | DataType::V | DataType::VF => 4,
            DataType::UQ | DataType::Q | DataType::DF | DataType::NF => 8,
            DataType::Undef => 0,
        }
    }
}

/// Architecture register kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchReg {
    Null,
    A0,
    Acc0,
    Acc1,
    Mask0,
    Ms0,
    Dbg,
    Sr0,
    Cr0,
    N0,
    N1,
    Ip,
    F0,
    F1,
    Tm0,
    Tdr0,
    Sp,
}

/// Register file an operand lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegFile {
    Grf,
    Arf(ArchReg),
}

impl RegFile {
    pub fn is_null(self) -> bool {
        self == RegFile::Arf(ArchReg::Null)
    }
}

/// Stride value meaning "indeterminate" (VxH indirect regions).
pub const STRIDE_UNDEFINED: u16 = 0xFFFF;

/// Source region `<vert_stride; width, horz_stride>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionDesc {
    pub vert_stride: u16,
    pub width: u16,
    pub horz_stride: u16,
}

impl RegionDesc {
    pub const fn new(vert_stride: u16, width: u16, horz_stride: u16) -> Self {
        Self { vert_stride, width, horz_stride }
    }

    /// `<0;1,0>`
    pub const fn scalar() -> Self {
        Self::new(0, 1, 0)
    }

    /// `<8;8,1>`
    pub const fn contiguous8() -> Self {
        Self::new(8, 8, 1)
    }
}

/// Source modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SrcMod {
    #[default]
    None,
    Neg,
    Abs,
    NegAbs,
    /// Logical not on integer operands.
    Not,
}

/// Implicit accumulator channel selector of macro instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccSel {
    #[default]
    NoAcc,
    Acc2,
    Acc3,
    Acc4,
    Acc5,
    Acc6,
    Acc7,
    Acc8,
    Acc9,
    /// Channel selectors the target has no encoding for.
    Acc0,
    Acc1,
}

/// Register addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Addressing {
    #[default]
    Direct,
    /// Address-register-relative: `r[a0.sub, imm]`.
    Indirect { addr_sub_reg: u16, addr_imm: i16 },
}

/// Register source region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SrcRegion {
    pub file: RegFile,
    pub reg: u16,
    /// Sub-register offset in elements of `ty`.
    pub sub_reg: u16,
    pub addressing: Addressing,
    pub region: RegionDesc,
    pub ty: DataType,
    pub modifier: SrcMod,
    pub acc_sel: AccSel,
}

impl SrcRegion {
    pub fn grf(reg: u16, sub_reg: u16, region: RegionDesc, ty: DataType) -> Self {
        Self {
            file: RegFile::Grf,
            reg,
            sub_reg,
            addressing: Addressing::Direct,
            region,
            ty,
            modifier: SrcMod::None,
            acc_sel: AccSel::NoAcc,
        }
    }

    pub fn arf(reg: ArchReg, num: u16, sub_reg: u16, region: RegionDesc, ty: DataType) -> Self {
        Self { file: RegFile::Arf(reg), ..Self::grf(num, sub_reg, region, ty) }
    }

    pub fn null(ty: DataType) -> Self {
        Self::arf(ArchReg::Null, 0, 0, RegionDesc::scalar(), ty)
    }

    pub fn with_modifier(mut self, modifier: SrcMod) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn with_acc_sel(mut self, acc_sel: AccSel) -> Self {
        self.acc_sel = acc_sel;
        self
    }

    pub fn indirect(mut self, addr_sub_reg: u16, addr_imm: i16) -> Self {
        self.addressing = Addressing::Indirect { addr_sub_reg, addr_imm };
        self
    }
}

/// Destination region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DstRegion {
    pub file: RegFile,
    pub reg: u16,
    pub sub_reg: u16,
    pub addressing: Addressing,
    pub horz_stride: u16,
    pub ty: DataType,
    pub acc_sel: AccSel,
}

impl DstRegion {
    pub fn grf(reg: u16, sub_reg: u16, horz_stride: u16, ty: DataType) -> Self {
        Self {
            file: RegFile::Grf,
            reg,
            sub_reg,
            addressing: Addressing::Direct,
            horz_stride,
            ty,
            acc_sel: AccSel::NoAcc,
        }
    }

    pub fn arf(reg: ArchReg, num: u16, sub_reg: u16, ty: DataType) -> Self {
        Self { file: RegFile::Arf(reg), ..Self::grf(num, sub_reg, 1, ty) }
    }

    pub fn null(ty: DataType) -> Self {
        Self::arf(ArchReg::Null, 0, 0, ty)
    }

    pub fn with_acc_sel(mut self, acc_sel: AccSel) -> Self {
        self.acc_sel = acc_sel;
        self
    }

    pub fn indirect(mut self, addr_sub_reg: u16, addr_imm: i16) -> Self {
        self.addressing = Addressing::Indirect { addr_sub_reg, addr_imm };
        self
    }
}

/// Immediate operand; `bits` holds the raw value zero-extended to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Immediate {
    pub bits: u64,
    pub ty: DataType,
}

/// Source operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Reg(SrcRegion),
    Imm(Immediate),
    Label(LabelId),
}

impl Operand {
    pub fn imm(bits: u64, ty: DataType) -> Self {
        Operand::Imm(Immediate { bits, ty })
    }

    pub fn is_imm(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }

    pub fn as_reg(&self) -> Option<&SrcRegion> {
        match self {
            Operand::Reg(r) => Some(r),
            _ => None,
        }
    }

    pub fn ty(&self) -> DataType {
        match self {
            Operand::Reg(r) => r.ty,
            Operand::Imm(i) => i.ty,
            Operand::Label(_) => DataType::UD,
        }
    }
}

impl From<SrcRegion> for Operand {
    fn from(r: SrcRegion) -> Self {
        Operand::Reg(r)
    }
}
