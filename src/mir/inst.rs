// This module defines the mid-level instruction consumed by the encoder. An Instruction
// carries its opcode (a closed enum including the pseudo opcodes earlier stages leave
// behind), execution size and mask offset, instruction options, optional predicate and
// condition modifier with their flag references, destination and up to four source operands
// (split sends keep the descriptor and extended descriptor in source slots 2 and 3, unary
// sends keep the descriptor in slot 1), the message shape of send-class instructions, the
// jump targets of structured control flow, math/dpas/bfn function controls, the scoreboard
// annotation computed by the scheduler, and the program position assigned by the kernel.
// After serialization the encoder writes the resolved program-counter offset back into
// gen_offset; nothing else is mutated.

//! Mid-IR instructions.

use super::operand::{DataType, DstRegion, Operand};

/// Label identity within one kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

/// Mid-IR opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
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
    Call,
    Return,
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
    Label,
    PseudoMad,
    Do,
    PseudoAnd,
    PseudoOr,
    PseudoXor,
    PseudoNot,
    PseudoFcall,
    PseudoFret,
    PseudoSada2,
    PseudoExit,
    PseudoFcCall,
    PseudoFcRet,
    Intrinsic,
    SyncNop,
    SyncAllrd,
    SyncAllwr,
    Mulh,
    Madw,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Illegal => "illegal",
            Opcode::Mov => "mov",
            Opcode::Sel => "sel",
            Opcode::Movi => "movi",
            Opcode::Not => "not",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shr => "shr",
            Opcode::Shl => "shl",
            Opcode::Smov => "smov",
            Opcode::Asr => "asr",
            Opcode::Ror => "ror",
            Opcode::Rol => "rol",
            Opcode::Cmp => "cmp",
            Opcode::Cmpn => "cmpn",
            Opcode::Csel => "csel",
            Opcode::Bfrev => "bfrev",
            Opcode::Bfe => "bfe",
            Opcode::Bfi1 => "bfi1",
            Opcode::Bfi2 => "bfi2",
            Opcode::Jmpi => "jmpi",
            Opcode::Brd => "brd",
            Opcode::If => "if",
            Opcode::Brc => "brc",
            Opcode::Else => "else",
            Opcode::Endif => "endif",
            Opcode::While => "while",
            Opcode::Break => "break",
            Opcode::Cont => "cont",
            Opcode::Halt => "halt",
            Opcode::Call => "call",
            Opcode::Return => "ret",
            Opcode::Goto => "goto",
            Opcode::Join => "join",
            Opcode::Wait => "wait",
            Opcode::Send => "send",
            Opcode::Sendc => "sendc",
            Opcode::Sends => "sends",
            Opcode::Sendsc => "sendsc",
            Opcode::Math => "math",
            Opcode::Add => "add",
            Opcode::Mul => "mul",
            Opcode::Avg => "avg",
            Opcode::Frc => "frc",
            Opcode::Rndu => "rndu",
            Opcode::Rndd => "rndd",
            Opcode::Rnde => "rnde",
            Opcode::Rndz => "rndz",
            Opcode::Mac => "mac",
            Opcode::Mach => "mach",
            Opcode::Lzd => "lzd",
            Opcode::Fbh => "fbh",
            Opcode::Fbl => "fbl",
            Opcode::Cbit => "cbit",
            Opcode::Addc => "addc",
            Opcode::Subb => "subb",
            Opcode::Sad2 => "sad2",
            Opcode::Sada2 => "sada2",
            Opcode::Dp4 => "dp4",
            Opcode::Dph => "dph",
            Opcode::Dp3 => "dp3",
            Opcode::Dp2 => "dp2",
            Opcode::Dp4a => "dp4a",
            Opcode::Dpas => "dpas",
            Opcode::Dpasw => "dpasw",
            Opcode::Add3 => "add3",
            Opcode::Bfn => "bfn",
            Opcode::Line => "line",
            Opcode::Pln => "pln",
            Opcode::Mad => "mad",
            Opcode::Lrp => "lrp",
            Opcode::Madm => "madm",
            Opcode::Nop => "nop",
            Opcode::Label => "label",
            Opcode::PseudoMad => "pseudo_mad",
            Opcode::Do => "do",
            Opcode::PseudoAnd => "pseudo_and",
            Opcode::PseudoOr => "pseudo_or",
            Opcode::PseudoXor => "pseudo_xor",
            Opcode::PseudoNot => "pseudo_not",
            Opcode::PseudoFcall => "pseudo_fcall",
            Opcode::PseudoFret => "pseudo_fret",
            Opcode::PseudoSada2 => "pseudo_sada2",
            Opcode::PseudoExit => "pseudo_exit",
            Opcode::PseudoFcCall => "pseudo_fc_call",
            Opcode::PseudoFcRet => "pseudo_fc_ret",
            Opcode::Intrinsic => "intrinsic",
            Opcode::SyncNop => "sync_nop",
            Opcode::SyncAllrd => "sync_allrd",
            Opcode::SyncAllwr => "sync_allwr",
            Opcode::Mulh => "mulh",
            Opcode::Madw => "madw",
        }
    }

    pub fn is_send(self) -> bool {
        matches!(self, Opcode::Send | Opcode::Sendc | Opcode::Sends | Opcode::Sendsc)
    }

    pub fn is_split_send(self) -> bool {
        matches!(self, Opcode::Sends | Opcode::Sendsc)
    }

    pub fn is_dpas(self) -> bool {
        matches!(self, Opcode::Dpas | Opcode::Dpasw)
    }
}

/// Flag register reference `f<reg>.<sub_reg>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagRef {
    pub reg: u8,
    pub sub_reg: u8,
}

impl FlagRef {
    pub const fn new(reg: u8, sub_reg: u8) -> Self {
        Self { reg, sub_reg }
    }
}

/// Predicate control kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PredControl {
    #[default]
    Default,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub flag: FlagRef,
    pub control: PredControl,
    /// `!f0.0` form.
    pub inverse: bool,
}

impl Predicate {
    pub fn new(flag: FlagRef) -> Self {
        Self { flag, control: PredControl::Default, inverse: false }
    }

    pub fn inverted(mut self) -> Self {
        self.inverse = true;
        self
    }

    pub fn with_control(mut self, control: PredControl) -> Self {
        self.control = control;
        self
    }
}

/// Condition modifier kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondModifier {
    Z,
    E,
    Nz,
    Ne,
    G,
    Ge,
    L,
    Le,
    O,
    R,
    U,
}

/// Condition modifier with its flag write-back.
///
/// `flag` is absent on min/max `sel`, which carries a modifier but
/// writes no flag register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CondMod {
    pub modifier: CondModifier,
    pub flag: Option<FlagRef>,
}

/// Scoreboard token role as assigned by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Set,
    AfterRead,
    AfterWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SbToken {
    pub id: u8,
    pub kind: TokenKind,
}

/// Pipe a register distance counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DistanceType {
    #[default]
    Dist,
    DistAll,
    DistInt,
    DistFloat,
    DistLong,
}

/// Scheduler-assigned dependency annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SwsbAnnotation {
    pub token: Option<SbToken>,
    pub distance: u8,
    pub distance_type: DistanceType,
}

impl SwsbAnnotation {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.distance == 0
    }
}

/// Instruction option flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstOpts(u32);

impl InstOpts {
    pub const ACC_WR_CTRL: InstOpts = InstOpts(1 << 0);
    pub const ATOMIC: InstOpts = InstOpts(1 << 1);
    pub const BREAKPOINT: InstOpts = InstOpts(1 << 2);
    pub const NO_DD_CHK: InstOpts = InstOpts(1 << 3);
    pub const NO_DD_CLR: InstOpts = InstOpts(1 << 4);
    pub const NO_PREEMPT: InstOpts = InstOpts(1 << 5);
    pub const YIELD: InstOpts = InstOpts(1 << 6);
    pub const EOT: InstOpts = InstOpts(1 << 7);
    pub const NO_SRC_DEP_SET: InstOpts = InstOpts(1 << 8);
    pub const SERIALIZE: InstOpts = InstOpts(1 << 9);
    pub const COMPACTED: InstOpts = InstOpts(1 << 10);
    pub const NO_COMPACT: InstOpts = InstOpts(1 << 11);
    /// NoMask execution.
    pub const WRITE_ENABLE: InstOpts = InstOpts(1 << 12);

    pub const fn empty() -> Self {
        InstOpts(0)
    }

    pub fn contains(self, other: InstOpts) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: InstOpts) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: InstOpts) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for InstOpts {
    type Output = InstOpts;

    fn bitor(self, rhs: InstOpts) -> InstOpts {
        InstOpts(self.0 | rhs.0)
    }
}

/// Shared function a send message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sfid {
    Null,
    Sampler,
    Gateway,
    DpDc2,
    DpWrite,
    Urb,
    Spawner,
    Vme,
    DpCc,
    DpDc0,
    DpPi,
    DpDc1,
    Cre,
}

/// Raw message shape of a send-class instruction.
///
/// This is the single source of truth for the message: the encoder takes the
/// second-source length from here and never recomputes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgDesc {
    pub sfid: Sfid,
    /// Packed extended descriptor of unary sends.
    pub ext_desc: u32,
    /// Register count of the second payload (split sends).
    pub ext_msg_length: u8,
    /// Returned data is 16 bits wide.
    pub half_return: bool,
    /// Payload data is 16 bits wide.
    pub half_input: bool,
    /// Coarse pixel shading enabled in the message.
    pub cps_enabled: bool,
}

impl MsgDesc {
    pub fn new(sfid: Sfid) -> Self {
        Self {
            sfid,
            ext_desc: 0,
            ext_msg_length: 0,
            half_return: false,
            half_input: false,
            cps_enabled: false,
        }
    }
}

/// Jump targets of structured control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CfInfo {
    pub jip: Option<LabelId>,
    pub uip: Option<LabelId>,
    pub backward: bool,
}

/// Math function control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOp {
    Inv,
    Log,
    Exp,
    Sqrt,
    Rsq,
    Sin,
    Cos,
    Fdiv,
    Pow,
    IntDiv,
    IntDivQuot,
    IntDivRem,
    Invm,
    Rsqrtm,
}

/// Operand precision of systolic sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    U1,
    U2,
    U4,
    U8,
    S2,
    S4,
    S8,
    Fp16,
    Bf16,
    Undef,
}

impl Precision {
    pub fn bits(self) -> u32 {
        match self {
            Precision::U1 => 1,
            Precision::U2 | Precision::S2 => 2,
            Precision::U4 | Precision::S4 => 4,
            Precision::U8 | Precision::S8 => 8,
            Precision::Fp16 | Precision::Bf16 => 16,
            Precision::Undef => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DpasInfo {
    pub systolic_depth: u8,
    pub repeat_count: u8,
    pub src1_precision: Precision,
    pub src2_precision: Precision,
}

/// Lowering phase owning an intrinsic pseudo-instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoweringPhase {
    BinaryEncoding,
    RegisterAllocation,
    Scheduling,
}

/// Marks an instruction whose offset the runtime loader uses to skip a prologue stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipPoint {
    PerThreadPayload,
    CrossThreadPayload,
    ComputeFfidGp,
    ComputeFfidGp1,
}

/// One mid-IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub exec_size: u8,
    pub mask_offset: u8,
    pub options: InstOpts,
    pub predicate: Option<Predicate>,
    pub cond_mod: Option<CondMod>,
    pub saturate: bool,
    pub dst: Option<DstRegion>,
    pub srcs: Vec<Operand>,
    /// Label defined by an `Opcode::Label` pseudo-instruction.
    pub label: Option<LabelId>,
    pub cf: Option<CfInfo>,
    pub msg: Option<MsgDesc>,
    pub math: Option<MathOp>,
    pub dpas: Option<DpasInfo>,
    pub bfn_ctrl: u8,
    pub intrinsic: Option<LoweringPhase>,
    pub swsb: SwsbAnnotation,
    pub skip_point: Option<SkipPoint>,
    /// Program position, strictly increasing in emission order.
    pub position: u32,
    /// Byte offset in the encoded binary, recorded by the serializer.
    pub gen_offset: Option<u32>,
}

impl Instruction {
    pub fn new(opcode: Opcode, exec_size: u8) -> Self {
        Self {
            opcode,
            exec_size,
            mask_offset: 0,
            options: InstOpts::empty(),
            predicate: None,
            cond_mod: None,
            saturate: false,
            dst: None,
            srcs: Vec::new(),
            label: None,
            cf: None,
            msg: None,
            math: None,
            dpas: None,
            bfn_ctrl: 0,
            intrinsic: None,
            swsb: SwsbAnnotation::default(),
            skip_point: None,
            position: 0,
            gen_offset: None,
        }
    }

    pub fn label(id: LabelId) -> Self {
        let mut inst = Self::new(Opcode::Label, 1);
        inst.label = Some(id);
        inst
    }

    pub fn nop() -> Self {
        Self::new(Opcode::Nop, 1)
    }

    pub fn with_dst(mut self, dst: DstRegion) -> Self {
        self.dst = Some(dst);
        self
    }

    pub fn with_src(mut self, src: impl Into<Operand>) -> Self {
        self.srcs.push(src.into());
        self
    }

    pub fn with_pred(mut self, pred: Predicate) -> Self {
        self.predicate = Some(pred);
        self
    }

    pub fn with_cond_mod(mut self, modifier: CondModifier, flag: Option<FlagRef>) -> Self {
        self.cond_mod = Some(CondMod { modifier, flag });
        self
    }

    pub fn with_options(mut self, opts: InstOpts) -> Self {
        self.options.insert(opts);
        self
    }

    pub fn with_mask_offset(mut self, offset: u8) -> Self {
        self.mask_offset = offset;
        self
    }

    pub fn with_saturate(mut self) -> Self {
        self.saturate = true;
        self
    }

    pub fn with_cf(mut self, cf: CfInfo) -> Self {
        self.cf = Some(cf);
        self
    }

    pub fn with_msg(mut self, msg: MsgDesc) -> Self {
        self.msg = Some(msg);
        self
    }

    pub fn with_math(mut self, op: MathOp) -> Self {
        self.math = Some(op);
        self
    }

    pub fn with_dpas(mut self, info: DpasInfo) -> Self {
        self.dpas = Some(info);
        self
    }

    pub fn with_bfn_ctrl(mut self, ctrl: u8) -> Self {
        self.bfn_ctrl = ctrl;
        self
    }

    pub fn with_swsb(mut self, swsb: SwsbAnnotation) -> Self {
        self.swsb = swsb;
        self
    }

    pub fn with_skip_point(mut self, point: SkipPoint) -> Self {
        self.skip_point = Some(point);
        self
    }

    pub fn is_label(&self) -> bool {
        self.opcode == Opcode::Label
    }

    pub fn is_send(&self) -> bool {
        self.opcode.is_send()
    }

    pub fn is_split_send(&self) -> bool {
        self.opcode.is_split_send()
    }

    pub fn is_eot(&self) -> bool {
        self.options.contains(InstOpts::EOT)
    }

    pub fn is_write_enable(&self) -> bool {
        self.options.contains(InstOpts::WRITE_ENABLE)
    }

    /// Math instructions execute on the shared math pipe.
    pub fn is_math_pipe(&self) -> bool {
        self.opcode == Opcode::Math
    }

    /// Source slot holding the message descriptor of a send.
    pub fn desc_operand(&self) -> Option<&Operand> {
        if !self.is_send() {
            return None;
        }
        let idx = if self.is_split_send() { 2 } else { 1 };
        self.srcs.get(idx)
    }

    /// Source slot holding the extended descriptor of a split send.
    pub fn ex_desc_operand(&self) -> Option<&Operand> {
        if self.is_split_send() {
            self.srcs.get(3)
        } else {
            None
        }
    }

    /// Type of the operand in `slot`, `None` for the destination.
    pub fn operand_type(&self, src: Option<usize>) -> DataType {
        match src {
            None => self.dst.map(|d| d.ty).unwrap_or(DataType::Undef),
            Some(i) => self.srcs.get(i).map(|s| s.ty()).unwrap_or(DataType::Undef),
        }
    }
}
