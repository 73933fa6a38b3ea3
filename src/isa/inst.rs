// This module defines the fully-resolved target instruction the backend owns: the header
// fields fixed at creation time (op, subfunction, predication, flag register, execution size,
// channel offset, mask control, flag modifier, branch control), the destination and up to
// three sources in their direct, indirect, macro, immediate or label forms, the send
// descriptor pair with the second-source length, the instruction option set and the
// scoreboard annotation. The setters mirror the order in which the translator fills an
// instruction after creating it; validate() is the backend's own legality check and is run
// for every instruction before encoding.

//! Target instruction model.

use super::op::{is_macro, Op, Subfunction};
use super::swsb::Swsb;
use super::types::{
    BranchCtrl, ChannelOffset, DstModifier, ExecSize, FlagModifier, HorzStride, ImmValue,
    InstOptSet, IsaType, MaskCtrl, MathMacroExt, Predication, RegName, RegRef, Region, SendDesc,
    SrcModifier,
};

/// Index of a block inside one backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Index of an instruction inside one backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstHandle(pub u32);

/// Fields fixed when an instruction is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstHeader {
    pub op: Op,
    pub subfunction: Subfunction,
    pub predication: Predication,
    pub flag_reg: RegRef,
    pub exec_size: ExecSize,
    pub chan_off: ChannelOffset,
    pub mask_ctrl: MaskCtrl,
    pub flag_modifier: FlagModifier,
}

impl InstHeader {
    pub fn new(op: Op, exec_size: ExecSize) -> Self {
        Self {
            op,
            subfunction: Subfunction::None,
            predication: Predication::default(),
            flag_reg: RegRef::default(),
            exec_size,
            chan_off: ChannelOffset::M0,
            mask_ctrl: MaskCtrl::Normal,
            flag_modifier: FlagModifier::None,
        }
    }
}

/// Destination operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Direct { reg_name: RegName, reg: RegRef, horz: HorzStride, ty: IsaType },
    Indirect { addr: RegRef, addr_imm: i16, horz: HorzStride, ty: IsaType },
    Macro { reg_name: RegName, reg_num: u16, mme: MathMacroExt, ty: IsaType },
}

impl Destination {
    pub fn ty(&self) -> IsaType {
        match *self {
            Destination::Direct { ty, .. }
            | Destination::Indirect { ty, .. }
            | Destination::Macro { ty, .. } => ty,
        }
    }

    /// GRF register written, if the destination is a direct or macro GRF operand.
    pub fn grf(&self) -> Option<u16> {
        match *self {
            Destination::Direct { reg_name: RegName::Grf, reg, .. } => Some(reg.reg_num),
            Destination::Macro { reg_name: RegName::Grf, reg_num, .. } => Some(reg_num),
            _ => None,
        }
    }
}

/// Source operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Direct {
        reg_name: RegName,
        reg: RegRef,
        region: Region,
        ty: IsaType,
        modifier: SrcModifier,
    },
    Indirect {
        addr: RegRef,
        addr_imm: i16,
        region: Region,
        ty: IsaType,
        modifier: SrcModifier,
    },
    Macro {
        reg_name: RegName,
        reg_num: u16,
        mme: MathMacroExt,
        region: Region,
        ty: IsaType,
        modifier: SrcModifier,
    },
    Imm { value: ImmValue, ty: IsaType },
    Label { block: BlockId, ty: IsaType },
}

impl Source {
    pub fn ty(&self) -> IsaType {
        match *self {
            Source::Direct { ty, .. }
            | Source::Indirect { ty, .. }
            | Source::Macro { ty, .. }
            | Source::Imm { ty, .. }
            | Source::Label { ty, .. } => ty,
        }
    }

    pub fn region(&self) -> Option<Region> {
        match *self {
            Source::Direct { region, .. }
            | Source::Indirect { region, .. }
            | Source::Macro { region, .. } => Some(region),
            _ => None,
        }
    }

    pub fn modifier(&self) -> SrcModifier {
        match *self {
            Source::Direct { modifier, .. }
            | Source::Indirect { modifier, .. }
            | Source::Macro { modifier, .. } => modifier,
            _ => SrcModifier::None,
        }
    }

    pub fn grf(&self) -> Option<u16> {
        match *self {
            Source::Direct { reg_name: RegName::Grf, reg, .. } => Some(reg.reg_num),
            Source::Macro { reg_name: RegName::Grf, reg_num, .. } => Some(reg_num),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Source::Direct { reg_name: RegName::ArfNull, .. })
    }
}

/// Resolved target instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsaInstruction {
    pub header: InstHeader,
    pub branch_ctrl: BranchCtrl,
    pub dst: Option<Destination>,
    pub dst_modifier: DstModifier,
    pub srcs: [Option<Source>; 3],
    pub desc: Option<SendDesc>,
    pub ex_desc: Option<SendDesc>,
    pub src1_length: u8,
    pub opts: InstOptSet,
    pub swsb: Swsb,
    /// Caller-supplied id, usually the mid-IR program position.
    pub id: u32,
}

impl IsaInstruction {
    pub fn new(header: InstHeader) -> Self {
        Self {
            header,
            branch_ctrl: BranchCtrl::Off,
            dst: None,
            dst_modifier: DstModifier::None,
            srcs: [None; 3],
            desc: None,
            ex_desc: None,
            src1_length: 0,
            opts: InstOptSet::empty(),
            swsb: Swsb::default(),
            id: 0,
        }
    }

    pub fn op(&self) -> Op {
        self.header.op
    }

    pub fn set_direct_destination(
        &mut self,
        modifier: DstModifier,
        reg_name: RegName,
        reg: RegRef,
        horz: HorzStride,
        ty: IsaType,
    ) {
        self.dst_modifier = modifier;
        self.dst = Some(Destination::Direct { reg_name, reg, horz, ty });
    }

    pub fn set_indirect_destination(
        &mut self,
        modifier: DstModifier,
        addr: RegRef,
        addr_imm: i16,
        horz: HorzStride,
        ty: IsaType,
    ) {
        self.dst_modifier = modifier;
        self.dst = Some(Destination::Indirect { addr, addr_imm, horz, ty });
    }

    pub fn set_macro_destination(
        &mut self,
        modifier: DstModifier,
        reg_name: RegName,
        reg_num: u16,
        mme: MathMacroExt,
        ty: IsaType,
    ) {
        self.dst_modifier = modifier;
        self.dst = Some(Destination::Macro { reg_name, reg_num, mme, ty });
    }

    pub fn set_source(&mut self, idx: usize, src: Source) {
        if let Some(slot) = self.srcs.get_mut(idx) {
            *slot = Some(src);
        }
    }

    pub fn set_immediate_source(&mut self, idx: usize, value: ImmValue, ty: IsaType) {
        self.set_source(idx, Source::Imm { value, ty });
    }

    pub fn set_label_source(&mut self, idx: usize, block: BlockId, ty: IsaType) {
        self.set_source(idx, Source::Label { block, ty });
    }

    pub fn set_src1_length(&mut self, len: u8) {
        self.src1_length = len;
    }

    pub fn set_branch_ctrl(&mut self, ctrl: BranchCtrl) {
        self.branch_ctrl = ctrl;
    }

    pub fn add_inst_opts(&mut self, opts: InstOptSet) {
        self.opts.insert(opts);
    }

    pub fn set_swsb(&mut self, swsb: Swsb) {
        self.swsb = swsb;
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn num_srcs(&self) -> usize {
        self.srcs.iter().filter(|s| s.is_some()).count()
    }

    /// Label targets of a branch, in source order.
    pub fn label_targets(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.srcs.iter().filter_map(|s| match s {
            Some(Source::Label { block, .. }) => Some(*block),
            _ => None,
        })
    }

    /// Structural legality check.
    pub fn validate(&self) -> Result<(), String> {
        let op = self.op();
        if self.dst.is_some() && !op.supports_destination() {
            return Err(format!("{} cannot have a destination", op.mnemonic()));
        }
        if self.header.predication.function != super::types::PredCtrl::None
            && !op.supports_predication()
        {
            return Err(format!("{} cannot be predicated", op.mnemonic()));
        }
        if self.header.flag_modifier != FlagModifier::None
            && !op.supports_flag_modifier()
            && !is_macro(op, self.header.subfunction)
        {
            return Err(format!("{} cannot carry a flag modifier", op.mnemonic()));
        }
        if self.dst_modifier == DstModifier::Sat && !op.supports_saturation() {
            return Err(format!("{} cannot saturate", op.mnemonic()));
        }
        if op.is_send_family() {
            if self.desc.is_none() {
                return Err("send without message descriptor".to_string());
            }
            if self.ex_desc.is_none() {
                return Err("send without extended descriptor".to_string());
            }
        } else if self.desc.is_some() || self.ex_desc.is_some() {
            return Err(format!("{} cannot carry a message descriptor", op.mnemonic()));
        }
        let labels = self.label_targets().count();
        if labels > 0 && !op.is_branching() {
            return Err(format!("{} cannot take a label source", op.mnemonic()));
        }
        let has_mods = self.srcs.iter().flatten().any(|s| s.modifier() != SrcModifier::None);
        if has_mods && !op.supports_source_modifiers() {
            return Err(format!("{} cannot take source modifiers", op.mnemonic()));
        }
        Ok(())
    }
}
