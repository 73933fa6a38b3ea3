// This module holds the resolved operand model of the target instruction set: the closed
// enumerations the operand mapper translates into (execution size, channel offset, mask and
// branch control, register names, types, predication, flag modifiers, source and destination
// modifiers, region fields, implicit accumulator selectors) plus the register reference,
// immediate value and send descriptor shapes the backend accepts. Every enumeration carries
// the small integer code the reference backend writes into its fields.

//! Target operand model.

/// Execution width in lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecSize {
    Simd1,
    Simd2,
    Simd4,
    Simd8,
    Simd16,
    Simd32,
}

impl ExecSize {
    pub fn lanes(self) -> u32 {
        1 << self.code()
    }

    /// log2 of the lane count.
    pub fn code(self) -> u8 {
        match self {
            ExecSize::Simd1 => 0,
            ExecSize::Simd2 => 1,
            ExecSize::Simd4 => 2,
            ExecSize::Simd8 => 3,
            ExecSize::Simd16 => 4,
            ExecSize::Simd32 => 5,
        }
    }
}

/// Execution mask channel offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOffset {
    M0,
    M4,
    M8,
    M12,
    M16,
    M20,
    M24,
    M28,
}

impl ChannelOffset {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaskCtrl {
    #[default]
    Normal,
    NoMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BranchCtrl {
    #[default]
    Off,
    On,
}

/// Target register names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegName {
    Grf,
    ArfNull,
    ArfA,
    ArfAcc,
    ArfCe,
    ArfMsg,
    ArfDbg,
    ArfSr,
    ArfCr,
    ArfN,
    ArfIp,
    ArfF,
    ArfTm,
    ArfTdr,
    ArfSp,
    ArfMme,
}

impl RegName {
    pub fn is_arf(self) -> bool {
        self != RegName::Grf
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Target scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsaType {
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
    UV,
    V,
    VF,
    NF,
    BF,
    U1,
    U2,
    U4,
    S2,
    S4,
    /// No type; used for null operands whose type the target ignores.
    Invalid,
}

impl IsaType {
    /// Size in bits of one element.
    pub fn bits(self) -> u32 {
        match self {
            IsaType::U1 => 1,
            IsaType::U2 | IsaType::S2 => 2,
            IsaType::U4 | IsaType::S4 => 4,
            IsaType::UB | IsaType::B => 8,
            IsaType::UW | IsaType::W | IsaType::HF | IsaType::BF => 16,
            IsaType::UD | IsaType::D | IsaType::F | IsaType::UV | IsaType::V | IsaType::VF => 32,
            IsaType::UQ | IsaType::Q | IsaType::DF | IsaType::NF => 64,
            IsaType::Invalid => 0,
        }
    }

    /// 4-bit register type code; sub-byte and invalid types have none.
    pub fn reg_code(self) -> Option<u8> {
        match self {
            IsaType::U1
            | IsaType::U2
            | IsaType::U4
            | IsaType::S2
            | IsaType::S4
            | IsaType::Invalid => None,
            t => Some(t as u8),
        }
    }

    /// 4-bit systolic precision code.
    pub fn precision_code(self) -> Option<u8> {
        match self {
            IsaType::U1 => Some(0),
            IsaType::U2 => Some(1),
            IsaType::U4 => Some(2),
            IsaType::UB => Some(3),
            IsaType::S2 => Some(4),
            IsaType::S4 => Some(5),
            IsaType::B => Some(6),
            IsaType::HF => Some(7),
            IsaType::BF => Some(8),
            _ => None,
        }
    }
}

/// Predicate control function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PredCtrl {
    #[default]
    None,
    Seq,
    Any2h,
    Any4h,
    Any8h,
    Any16h,
    Any32h,
    All2h,
    All4h,
    All8h,
    All16h,
    All32h,
    AnyV,
    AllV,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Predication {
    pub function: PredCtrl,
    pub inverse: bool,
}

/// Flag modifier (condition modifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlagModifier {
    #[default]
    None,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Ov,
    Un,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SrcModifier {
    #[default]
    None,
    Neg,
    Abs,
    NegAbs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DstModifier {
    #[default]
    None,
    Sat,
}

/// Vertical stride field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertStride {
    Vs0,
    Vs1,
    Vs2,
    Vs4,
    Vs8,
    Vs16,
    Vs32,
    VxH,
    Invalid,
}

/// Width field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W1,
    W2,
    W4,
    W8,
    W16,
    Invalid,
}

/// Horizontal stride field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HorzStride {
    Hs0,
    Hs1,
    Hs2,
    Hs4,
    Invalid,
}

impl HorzStride {
    pub fn code(self) -> Option<u8> {
        match self {
            HorzStride::Hs0 => Some(0),
            HorzStride::Hs1 => Some(1),
            HorzStride::Hs2 => Some(2),
            HorzStride::Hs4 => Some(3),
            HorzStride::Invalid => None,
        }
    }
}

/// Source region `<vert; width, horz>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub vert: VertStride,
    pub width: Width,
    pub horz: HorzStride,
}

impl Region {
    pub const INVALID: Region =
        Region { vert: VertStride::Invalid, width: Width::Invalid, horz: HorzStride::Invalid };

    pub const fn new(vert: VertStride, width: Width, horz: HorzStride) -> Self {
        Self { vert, width, horz }
    }

    /// `<0;1,0>`
    pub const fn scalar() -> Self {
        Self::new(VertStride::Vs0, Width::W1, HorzStride::Hs0)
    }

    /// 8-bit field code: vert (3) | width (3) | horz (2).
    pub fn code(self) -> Option<u8> {
        let vert = match self.vert {
            VertStride::Vs0 => 0,
            VertStride::Vs1 => 1,
            VertStride::Vs2 => 2,
            VertStride::Vs4 => 3,
            VertStride::Vs8 => 4,
            VertStride::Vs16 => 5,
            VertStride::Vs32 => 6,
            VertStride::VxH => 7,
            VertStride::Invalid => return None,
        };
        let width = match self.width {
            Width::W1 => 0,
            Width::W2 => 1,
            Width::W4 => 2,
            Width::W8 => 3,
            Width::W16 => 4,
            Width::Invalid => return None,
        };
        Some((vert << 5) | (width << 2) | self.horz.code()?)
    }
}

/// Implicit accumulator selector of macro operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathMacroExt {
    Mme0,
    Mme1,
    Mme2,
    Mme3,
    Mme4,
    Mme5,
    Mme6,
    Mme7,
    NoMme,
}

impl MathMacroExt {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Register number and sub-register number (in units of the operand type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegRef {
    pub reg_num: u16,
    pub sub_reg_num: u16,
}

impl RegRef {
    pub const fn new(reg_num: u16, sub_reg_num: u16) -> Self {
        Self { reg_num, sub_reg_num }
    }
}

/// Immediate value in the width the target encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmValue {
    U16(u16),
    S16(i16),
    U32(u32),
    S32(i32),
    U64(u64),
    S64(i64),
    F16(u16),
    F32(u32),
    F64(u64),
}

impl ImmValue {
    /// Raw bits zero-extended to 64 bits.
    pub fn raw_bits(self) -> u64 {
        match self {
            ImmValue::U16(v) | ImmValue::F16(v) => v as u64,
            ImmValue::S16(v) => v as u16 as u64,
            ImmValue::U32(v) | ImmValue::F32(v) => v as u64,
            ImmValue::S32(v) => v as u32 as u64,
            ImmValue::U64(v) | ImmValue::F64(v) => v,
            ImmValue::S64(v) => v as u64,
        }
    }

    pub fn is_64bit(self) -> bool {
        matches!(self, ImmValue::U64(_) | ImmValue::S64(_) | ImmValue::F64(_))
    }
}

/// Message descriptor or extended descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendDesc {
    Imm(u32),
    /// Address register `a0.<sub_reg>`.
    Reg32A { sub_reg: u16 },
}

/// Instruction option set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstOptSet(u16);

impl InstOptSet {
    pub const ACC_WR_EN: InstOptSet = InstOptSet(1 << 0);
    pub const ATOMIC: InstOptSet = InstOptSet(1 << 1);
    pub const BREAKPOINT: InstOptSet = InstOptSet(1 << 2);
    pub const NO_DD_CHK: InstOptSet = InstOptSet(1 << 3);
    pub const NO_DD_CLR: InstOptSet = InstOptSet(1 << 4);
    pub const NO_PREEMPT: InstOptSet = InstOptSet(1 << 5);
    pub const SWITCH: InstOptSet = InstOptSet(1 << 6);
    pub const EOT: InstOptSet = InstOptSet(1 << 7);
    pub const NO_SRC_DEP_SET: InstOptSet = InstOptSet(1 << 8);
    pub const SERIALIZE: InstOptSet = InstOptSet(1 << 9);
    pub const COMPACTED: InstOptSet = InstOptSet(1 << 10);
    pub const NO_COMPACT: InstOptSet = InstOptSet(1 << 11);
    /// Coarse pixel shading in a register-sourced extended descriptor.
    pub const CPS: InstOptSet = InstOptSet(1 << 12);
    /// Extended base-scale-offset addressing of the extended descriptor.
    pub const EXBSO: InstOptSet = InstOptSet(1 << 13);

    /// Options carried in the 7-bit control field of non-send instructions.
    pub const ALU_CONTROLS: [InstOptSet; 7] = [
        Self::ACC_WR_EN,
        Self::ATOMIC,
        Self::BREAKPOINT,
        Self::NO_DD_CHK,
        Self::NO_DD_CLR,
        Self::NO_PREEMPT,
        Self::SWITCH,
    ];

    pub const fn empty() -> Self {
        InstOptSet(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: InstOptSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: InstOptSet) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: InstOptSet) {
        self.0 &= !other.0;
    }

    /// Packed bits of the given options, one bit per entry in order.
    pub fn pack(self, order: &[InstOptSet]) -> u64 {
        order
            .iter()
            .enumerate()
            .filter(|(_, o)| self.contains(**o))
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }
}

impl std::ops::BitOr for InstOptSet {
    type Output = InstOptSet;

    fn bitor(self, rhs: InstOptSet) -> InstOptSet {
        InstOptSet(self.0 | rhs.0)
    }
}
