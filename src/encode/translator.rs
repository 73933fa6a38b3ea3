// This module translates one mid-IR instruction into one backend instruction. The order of
// work is fixed: resolve the target opcode and subfunction, resolve the predicate / flag /
// condition modifier triple (a predicate and a condition modifier naming different flag
// registers is a FlagConflict), build the header (execution size, channel offset, NoMask for
// jmpi and write-enable instructions), then create the instruction through the backend in
// one of three shapes. Branches take their explicit label or register sources slot by slot,
// or the jip/uip labels of structured control flow, all resolved through the block linker;
// a branch with no target at all gets a fresh anonymous block as its only target and
// reports it back so the caller continues emitting into it. Sends get their descriptor pair
// from the send descriptor encoder and only their payload registers as sources, left untyped
// for the backend. Everything else takes its destination and sources through the operand
// mapper, with the three-source region rule, the dpas precision types and the extra null
// source of binary movi applied here. Instruction options and the scoreboard annotation are
// translated last, and the mid-IR position becomes the backend id.

//! Per-instruction translation.

use log::{trace, warn};

use crate::core::error::{EmitError, EmitResult, OperandSlot};
use crate::core::options::EncoderOptions;
use crate::core::platform::PlatformFeatures;
use crate::isa::op::is_macro;
use crate::isa::{
    BlockId, BranchCtrl, DstModifier, HorzStride, InstHandle, InstHeader, InstOptSet, IsaBackend,
    IsaInstruction, IsaType, MaskCtrl, MathMacroExt, Op, RegName, RegRef, Region, Source,
    SrcModifier, VertStride, Width,
};
use crate::mir::{Addressing, DstRegion, Instruction, InstOpts, LabelId, Operand, SrcRegion};

use super::block_linker::BlockLinker;
use super::opcode::{resolve_opcode, ResolvedOp};
use super::operand_map::{self as map, Site};
use super::send_desc::encode_send_descriptors;
use super::swsb::encode_swsb;

/// Outcome of translating one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translated {
    pub handle: InstHandle,
    pub op: Op,
    /// Block synthesized as the target of a branch without explicit target.
    /// Emission continues in it.
    pub fallthrough: Option<BlockId>,
}

/// Translator for one instruction stream.
///
/// Owns the label map of the stream; a translator must not be reused for
/// another kernel.
pub struct Translator<'b, B: IsaBackend> {
    backend: &'b mut B,
    features: PlatformFeatures,
    options: EncoderOptions,
    linker: BlockLinker,
}

impl<'b, B: IsaBackend> Translator<'b, B> {
    pub fn new(backend: &'b mut B, features: PlatformFeatures, options: EncoderOptions) -> Self {
        Self { backend, features, options, linker: BlockLinker::new() }
    }

    pub fn backend(&mut self) -> &mut B {
        &mut *self.backend
    }

    pub fn linker(&self) -> &BlockLinker {
        &self.linker
    }

    pub fn features(&self) -> &PlatformFeatures {
        &self.features
    }

    /// Block owned by `label`.
    pub fn resolve_label(&mut self, label: LabelId) -> BlockId {
        self.linker.resolve(&mut *self.backend, label)
    }

    pub fn translate(&mut self, inst: &Instruction) -> EmitResult<Translated> {
        let Some(resolved) = resolve_opcode(inst, &self.features, false)? else {
            return Err(EmitError::UnsupportedOpcode {
                position: inst.position,
                opcode: inst.opcode.name(),
                platform: self.features.platform.name(),
            });
        };
        let header = self.header(inst, resolved)?;
        let op = resolved.op;

        let mut fallthrough = None;
        let handle = if op.is_branching() {
            let branch_ctrl = if inst.cf.is_some_and(|cf| cf.backward) {
                BranchCtrl::On
            } else {
                BranchCtrl::Off
            };
            let handle = self.backend.create_branch_instruction(header, branch_ctrl);
            fallthrough = self.branch_operands(inst, handle)?;
            handle
        } else if op.is_send_family() {
            let descs = encode_send_descriptors(inst, &self.features, &self.options)?;
            let handle = self.backend.create_send_instruction(header, descs.ex_desc, descs.desc);
            let target = self.target(inst, handle)?;
            target.set_src1_length(descs.src1_length);
            target.add_inst_opts(descs.opts);
            self.send_operands(inst, handle)?;
            handle
        } else {
            let handle = self.backend.create_basic_instruction(header);
            self.basic_operands(inst, resolved, handle)?;
            handle
        };

        let opts = self.inst_opts(inst, op);
        let swsb = encode_swsb(inst, op.inst_type(), &self.features)?;
        let target = self.target(inst, handle)?;
        target.add_inst_opts(opts);
        target.set_swsb(swsb);
        target.set_id(inst.position);

        trace!(
            "{:>5}: {} -> {} {:?}{}",
            inst.position,
            inst.opcode.name(),
            op.mnemonic(),
            resolved.subfunction,
            if fallthrough.is_some() { " (fallthrough block)" } else { "" }
        );
        Ok(Translated { handle, op, fallthrough })
    }

    fn target(&mut self, inst: &Instruction, handle: InstHandle) -> EmitResult<&mut IsaInstruction> {
        self.backend.instruction_mut(handle).ok_or_else(|| EmitError::BackendEncodeFailure {
            reason: format!("backend lost instruction {} created for position {}", handle.0, inst.position),
        })
    }

    fn site(inst: &Instruction, slot: OperandSlot) -> Site {
        Site::new(inst.position, inst.opcode.name(), slot)
    }

    fn header(&self, inst: &Instruction, resolved: ResolvedOp) -> EmitResult<InstHeader> {
        let site = Self::site(inst, OperandSlot::Inst);
        let op = resolved.op;
        let mut header = InstHeader::new(op, map::exec_size(site, inst.exec_size)?);
        header.subfunction = resolved.subfunction;
        header.chan_off = map::channel_offset(site, inst.mask_offset)?;
        if op == Op::Jmpi || inst.is_write_enable() {
            header.mask_ctrl = MaskCtrl::NoMask;
        }

        let pred = inst.predicate.filter(|_| op.supports_predication());
        if let Some(pred) = pred {
            header.predication = map::predication(&pred);
            header.flag_reg = map::flag_reg(pred.flag);
        }

        let cond = inst
            .cond_mod
            .filter(|_| op.supports_flag_modifier() || is_macro(op, resolved.subfunction));
        if let Some(cond) = cond {
            header.flag_modifier = map::flag_modifier(cond.modifier);
            if let Some(flag) = cond.flag {
                if let Some(pred) = pred {
                    if pred.flag != flag {
                        return Err(EmitError::FlagConflict {
                            position: inst.position,
                            opcode: inst.opcode.name(),
                            pred_flag: (pred.flag.reg, pred.flag.sub_reg),
                            cond_flag: (flag.reg, flag.sub_reg),
                        });
                    }
                }
                header.flag_reg = map::flag_reg(flag);
            }
        }
        Ok(header)
    }

    fn branch_operands(&mut self, inst: &Instruction, handle: InstHandle) -> EmitResult<Option<BlockId>> {
        let op = self.target(inst, handle)?.op();
        let dst = match inst.dst {
            Some(dst) if op.supports_destination() => Some(self.destination(inst, dst, false)?),
            _ => None,
        };

        let mut srcs: [Option<Source>; 2] = [None, None];
        let mut fallthrough = None;

        if matches!(op, Op::Ret | Op::Calla) && !matches!(inst.srcs.first(), Some(Operand::Reg(_))) {
            return Err(Self::site(inst, OperandSlot::Src(0))
                .illegal("src", "addressed branch without register source"));
        }

        if !inst.srcs.is_empty() {
            // Explicit targets: every source keeps its own slot.
            for (i, src) in inst.srcs.iter().enumerate() {
                let site = Self::site(inst, OperandSlot::Src(i as u8));
                if i >= srcs.len() {
                    return Err(site.illegal("src", "branch takes at most two sources"));
                }
                srcs[i] = Some(match src {
                    Operand::Reg(reg) => self.register_source(inst, i, reg, false, false)?,
                    Operand::Label(label) => {
                        let block = self.resolve_label(*label);
                        Source::Label { block, ty: IsaType::UD }
                    }
                    Operand::Imm(_) => return Err(site.illegal("src", "immediate branch target")),
                });
            }
        } else if let Some(jip) = inst.cf.and_then(|cf| cf.jip) {
            let block = self.resolve_label(jip);
            srcs[0] = Some(Source::Label { block, ty: IsaType::UD });
        } else {
            let block = self.linker.new_anonymous(&mut *self.backend);
            srcs[0] = Some(Source::Label { block, ty: IsaType::UD });
            fallthrough = Some(block);
        }
        if srcs[1].is_none() {
            if let Some(uip) = inst.cf.and_then(|cf| cf.uip) {
                let block = self.resolve_label(uip);
                srcs[1] = Some(Source::Label { block, ty: IsaType::UD });
            }
        }

        let target = self.target(inst, handle)?;
        if let Some(apply) = dst {
            apply.apply(target);
        }
        for (i, src) in srcs.into_iter().enumerate() {
            if let Some(src) = src {
                target.set_source(i, src);
            }
        }
        Ok(fallthrough)
    }

    fn send_operands(&mut self, inst: &Instruction, handle: InstHandle) -> EmitResult<()> {
        let dst = match inst.dst {
            Some(dst) => Some(self.destination(inst, dst, false)?),
            None => None,
        };
        let payloads = if inst.is_split_send() { 2 } else { 1 };
        let mut srcs = Vec::with_capacity(2);
        let half_input = self.half_input_workaround(inst);
        for (i, src) in inst.srcs.iter().take(payloads).enumerate() {
            match src {
                Operand::Reg(reg) => {
                    // The backend types send payloads itself.
                    let ty = if i == 0 && half_input { IsaType::HF } else { IsaType::Invalid };
                    let src = self.register_source(inst, i, reg, false, false)?;
                    srcs.push(with_type(src, ty));
                }
                _ => {
                    return Err(Self::site(inst, OperandSlot::Src(i as u8))
                        .illegal("payload", "send payload must be a register"))
                }
            }
        }
        if payloads == 1 && self.features.unified_send {
            srcs.push(Source::Direct {
                reg_name: RegName::ArfNull,
                reg: RegRef::new(0, 0),
                region: Region::new(VertStride::Vs0, Width::W1, HorzStride::Hs0),
                ty: IsaType::Invalid,
                modifier: SrcModifier::None,
            });
        }

        let target = self.target(inst, handle)?;
        if let Some(apply) = dst {
            apply.apply(target);
        }
        for (i, src) in srcs.into_iter().enumerate() {
            target.set_source(i, src);
        }
        Ok(())
    }

    fn basic_operands(&mut self, inst: &Instruction, resolved: ResolvedOp, handle: InstHandle) -> EmitResult<()> {
        let op = resolved.op;
        let macro_form = is_macro(op, resolved.subfunction);
        let dst = match inst.dst {
            Some(dst) if op.supports_destination() => Some(self.destination(inst, dst, macro_form)?),
            _ => None,
        };

        let three_src = inst.srcs.len() == 3;
        let mut srcs = Vec::with_capacity(3);
        for (i, src) in inst.srcs.iter().enumerate() {
            let site = Self::site(inst, OperandSlot::Src(i as u8));
            let src = match src {
                Operand::Reg(reg) => self.register_source(inst, i, reg, macro_form, three_src)?,
                Operand::Imm(imm) => Source::Imm {
                    value: map::immediate(site, *imm)?,
                    ty: map::data_type(site, imm.ty)?,
                },
                Operand::Label(_) => return Err(site.illegal("src", "label source on a non-branch")),
            };
            srcs.push(src);
        }
        if op == Op::Movi && srcs.len() == 1 && self.features.binary_movi {
            srcs.push(Source::Direct {
                reg_name: RegName::ArfNull,
                reg: RegRef::new(0, 0),
                region: Region::new(VertStride::Vs1, Width::W1, HorzStride::Hs0),
                ty: IsaType::UB,
                modifier: SrcModifier::None,
            });
        }

        let target = self.target(inst, handle)?;
        if let Some(apply) = dst {
            apply.apply(target);
        }
        for (i, src) in srcs.into_iter().enumerate() {
            target.set_source(i, src);
        }
        Ok(())
    }

    fn destination(
        &self,
        inst: &Instruction,
        dst: DstRegion,
        macro_form: bool,
    ) -> EmitResult<PendingDst> {
        let site = Self::site(inst, OperandSlot::Dst);
        let mut ty = map::data_type(site, dst.ty)?;
        if self.half_return_workaround(inst) {
            ty = IsaType::HF;
        }
        let modifier = if inst.saturate { DstModifier::Sat } else { DstModifier::None };
        let reg_name = map::reg_name(dst.file);
        let reg_num = map::reg_num(dst.file, dst.reg);

        if macro_form {
            let mme = map::math_macro_ext(site, dst.acc_sel)?;
            return Ok(PendingDst::Macro { modifier, reg_name, reg_num, mme, ty });
        }
        let horz = map::horz_stride(site, dst.horz_stride)?;
        Ok(match dst.addressing {
            Addressing::Direct => PendingDst::Direct {
                modifier,
                reg_name,
                reg: RegRef::new(reg_num, dst.sub_reg),
                horz,
                ty,
            },
            Addressing::Indirect { addr_sub_reg, addr_imm } => PendingDst::Indirect {
                modifier,
                addr: RegRef::new(0, addr_sub_reg),
                addr_imm,
                horz,
                ty,
            },
        })
    }

    /// Sends with a register descriptor returning 16-bit data on the
    /// platforms that need the destination typed as half float.
    fn half_return_workaround(&self, inst: &Instruction) -> bool {
        self.features.send_half_type_workaround
            && inst.is_send()
            && !inst.desc_operand().is_some_and(Operand::is_imm)
            && inst.msg.is_some_and(|m| m.half_return)
    }

    /// Same platforms and descriptor form, for 16-bit payloads: the first
    /// payload is typed half float.
    fn half_input_workaround(&self, inst: &Instruction) -> bool {
        self.features.send_half_type_workaround
            && !inst.desc_operand().is_some_and(Operand::is_imm)
            && inst.msg.is_some_and(|m| m.half_input)
    }

    fn register_source(
        &self,
        inst: &Instruction,
        idx: usize,
        src: &SrcRegion,
        macro_form: bool,
        three_src: bool,
    ) -> EmitResult<Source> {
        let site = Self::site(inst, OperandSlot::Src(idx as u8));
        let modifier = map::src_modifier(src.modifier);
        let region = if three_src {
            map::three_src_region(site, src.region, idx)?
        } else {
            map::region(site, src.region)?
        };
        let reg_name = map::reg_name(src.file);
        let reg_num = map::reg_num(src.file, src.reg);
        let mut ty = map::data_type(site, src.ty)?;
        let mut sub_reg = src.sub_reg;

        if let Some(dpas) = inst.dpas.filter(|_| inst.opcode.is_dpas() && idx > 0) {
            let precision = if idx == 1 { dpas.src1_precision } else { dpas.src2_precision };
            ty = map::precision_type(site, precision)?;
            if idx == 2 {
                let bits = precision.bits();
                sub_reg = ((sub_reg as u32 * src.ty.size() * 8) / bits) as u16;
            }
        }

        if macro_form {
            let mme = map::math_macro_ext(site, src.acc_sel)?;
            return Ok(Source::Macro { reg_name, reg_num, mme, region, ty, modifier });
        }
        Ok(match src.addressing {
            Addressing::Direct => Source::Direct {
                reg_name,
                reg: RegRef::new(reg_num, sub_reg),
                region,
                ty,
                modifier,
            },
            Addressing::Indirect { addr_sub_reg, addr_imm } => Source::Indirect {
                addr: RegRef::new(0, addr_sub_reg),
                addr_imm,
                region,
                ty,
                modifier,
            },
        })
    }

    fn inst_opts(&self, inst: &Instruction, op: Op) -> InstOptSet {
        const PLAIN: [(InstOpts, InstOptSet); 8] = [
            (InstOpts::ATOMIC, InstOptSet::ATOMIC),
            (InstOpts::BREAKPOINT, InstOptSet::BREAKPOINT),
            (InstOpts::NO_DD_CHK, InstOptSet::NO_DD_CHK),
            (InstOpts::NO_DD_CLR, InstOptSet::NO_DD_CLR),
            (InstOpts::NO_PREEMPT, InstOptSet::NO_PREEMPT),
            (InstOpts::YIELD, InstOptSet::SWITCH),
            (InstOpts::COMPACTED, InstOptSet::COMPACTED),
            (InstOpts::NO_COMPACT, InstOptSet::NO_COMPACT),
        ];
        const SEND_ONLY: [(InstOpts, InstOptSet, &str); 3] = [
            (InstOpts::EOT, InstOptSet::EOT, "EOT"),
            (InstOpts::NO_SRC_DEP_SET, InstOptSet::NO_SRC_DEP_SET, "NoSrcDepSet"),
            (InstOpts::SERIALIZE, InstOptSet::SERIALIZE, "Serialize"),
        ];

        let mut opts = InstOptSet::empty();
        for (from, to) in PLAIN {
            if inst.options.contains(from) {
                opts.insert(to);
            }
        }
        for (from, to, name) in SEND_ONLY {
            if inst.options.contains(from) {
                if op.is_send_family() {
                    opts.insert(to);
                } else {
                    warn!("dropping {name} on {} at {}", op.mnemonic(), inst.position);
                }
            }
        }
        if inst.options.contains(InstOpts::ACC_WR_CTRL) {
            if self.features.encodes_acc_wr_en {
                opts.insert(InstOptSet::ACC_WR_EN);
            } else {
                warn!(
                    "dropping AccWrEn on {} at {}: not encoded on {}",
                    op.mnemonic(),
                    inst.position,
                    self.features.platform
                );
            }
        }
        opts
    }
}

/// Destination computed before the instruction is borrowed for filling.
#[derive(Debug, Clone, Copy)]
enum PendingDst {
    Direct { modifier: DstModifier, reg_name: RegName, reg: RegRef, horz: HorzStride, ty: IsaType },
    Indirect { modifier: DstModifier, addr: RegRef, addr_imm: i16, horz: HorzStride, ty: IsaType },
    Macro { modifier: DstModifier, reg_name: RegName, reg_num: u16, mme: MathMacroExt, ty: IsaType },
}

impl PendingDst {
    fn apply(self, inst: &mut IsaInstruction) {
        match self {
            PendingDst::Direct { modifier, reg_name, reg, horz, ty } => {
                inst.set_direct_destination(modifier, reg_name, reg, horz, ty)
            }
            PendingDst::Indirect { modifier, addr, addr_imm, horz, ty } => {
                inst.set_indirect_destination(modifier, addr, addr_imm, horz, ty)
            }
            PendingDst::Macro { modifier, reg_name, reg_num, mme, ty } => {
                inst.set_macro_destination(modifier, reg_name, reg_num, mme, ty)
            }
        }
    }
}

fn with_type(src: Source, ty: IsaType) -> Source {
    match src {
        Source::Direct { reg_name, reg, region, modifier, .. } => {
            Source::Direct { reg_name, reg, region, ty, modifier }
        }
        Source::Indirect { addr, addr_imm, region, modifier, .. } => {
            Source::Indirect { addr, addr_imm, region, ty, modifier }
        }
        Source::Macro { reg_name, reg_num, mme, region, modifier, .. } => {
            Source::Macro { reg_name, reg_num, mme, region, ty, modifier }
        }
        other => other,
    }
}
