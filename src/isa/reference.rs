// This module implements IsaBackend with an in-crate reference encoder. It owns the blocks and
// instructions the translator creates, validates every appended instruction, optionally
// inserts register-distance dependencies for instructions the scheduler left un-annotated,
// verifies every scoreboard annotation against the encode mode, decides per instruction
// between the 8-byte compacted and the 16-byte native form, lays out program counters block
// by block in append order, and finally packs each instruction into little-endian words.
// Label sources become signed byte displacements relative to the branch itself; a branch to
// a block that was never appended is rejected, as is any value that does not fit its field.
//
// Native layout, shared header (bits 0..30):
//   [0,7) opcode  [7,15) swsb  [15,18) exec size  [18,21) channel offset  [21] NoMask
//   [22,26) predicate control  [26] inverse  [27] flag reg  [28] flag subreg  [29] compacted
// The remaining 98 bits depend on the form: two-source ALU, three-source ALU, branch, send.
// Register locations are 12 bits: GRF as reg:7 | byte:5, ARF as name:4 | num:4 | sub:4,
// indirect as a0 sub:4 | signed imm:8.

//! Reference encoding backend.

use std::ops::Range;

use log::{debug, trace};

use crate::core::platform::{Platform, PlatformFeatures, SwsbEncodeMode};

use super::backend::{BackendEncodeOptions, BackendError, EncodedBinary, IsaBackend};
use super::inst::{BlockId, Destination, InstHandle, InstHeader, IsaInstruction, Source};
use super::op::{Op, Subfunction};
use super::swsb::{DistType, InstType, Swsb};
use super::types::{
    BranchCtrl, DstModifier, ExecSize, HorzStride, ImmValue, InstOptSet, IsaType, MaskCtrl,
    RegName, RegRef, Region, SendDesc, SrcModifier, VertStride, Width,
};

pub const NATIVE_SIZE: u32 = 16;
pub const COMPACT_SIZE: u32 = 8;

const FILE_GRF: u64 = 0;
const FILE_ARF: u64 = 1;
const FILE_INDIRECT: u64 = 2;
const FILE_IMM: u64 = 3;

/// Location of the null register.
const NULL_LOC: u64 = 1 << 8;

/// Regions representable in the compacted form.
const COMPACT_REGIONS: [Region; 4] = [
    Region::new(VertStride::Vs0, Width::W1, HorzStride::Hs0),
    Region::new(VertStride::Vs1, Width::W1, HorzStride::Hs0),
    Region::new(VertStride::Vs8, Width::W8, HorzStride::Hs1),
    Region::new(VertStride::Vs16, Width::W16, HorzStride::Hs1),
];

struct FieldWriter {
    bits: u128,
    id: u32,
}

impl FieldWriter {
    fn new(id: u32) -> Self {
        Self { bits: 0, id }
    }

    fn set_field(&mut self, range: Range<usize>, value: u64, field: &'static str) -> Result<(), BackendError> {
        let width = range.end - range.start;
        if width < 64 && value >> width != 0 {
            return Err(BackendError::FieldOverflow { id: self.id, field, value: value as i64, bits: width });
        }
        let mask = (1u128 << width) - 1;
        self.bits = (self.bits & !(mask << range.start)) | ((value as u128 & mask) << range.start);
        Ok(())
    }

    fn set_bit(&mut self, bit: usize, value: bool, field: &'static str) -> Result<(), BackendError> {
        self.set_field(bit..bit + 1, value as u64, field)
    }

    fn set_signed(&mut self, range: Range<usize>, value: i64, field: &'static str) -> Result<(), BackendError> {
        let width = range.end - range.start;
        let min = -(1i64 << (width - 1));
        let max = (1i64 << (width - 1)) - 1;
        if value < min || value > max {
            return Err(BackendError::FieldOverflow { id: self.id, field, value, bits: width });
        }
        self.set_field(range, value as u64 & ((1u64 << width) - 1), field)
    }
}

fn overflow(id: u32, field: &'static str, value: u64, bits: usize) -> BackendError {
    BackendError::FieldOverflow { id, field, value: value as i64, bits }
}

fn invalid(id: u32, reason: impl Into<String>) -> BackendError {
    BackendError::InvalidInstruction { id, reason: reason.into() }
}

fn type_code(id: u32, ty: IsaType, field: &str) -> Result<u64, BackendError> {
    ty.reg_code()
        .map(u64::from)
        .ok_or_else(|| invalid(id, format!("{field} type {ty:?} has no register encoding")))
}

fn horz_code(id: u32, horz: HorzStride) -> Result<u64, BackendError> {
    horz.code().map(u64::from).ok_or_else(|| invalid(id, "unspecified horizontal stride"))
}

fn reg_loc(id: u32, reg_name: RegName, reg: RegRef, ty: IsaType) -> Result<(u64, u64), BackendError> {
    if reg_name == RegName::Grf {
        let byte = reg.sub_reg_num as u64 * ty.bits() as u64 / 8;
        let loc = ((reg.reg_num as u64) << 5) | byte;
        if reg.reg_num >= 128 || byte >= 32 {
            return Err(overflow(id, "grf", loc, 12));
        }
        return Ok((FILE_GRF, loc));
    }
    if reg.reg_num >= 16 || reg.sub_reg_num >= 16 {
        return Err(overflow(id, "arf", reg.reg_num as u64, 4));
    }
    let loc = ((reg_name.code() as u64) << 8) | ((reg.reg_num as u64) << 4) | reg.sub_reg_num as u64;
    Ok((FILE_ARF, loc))
}

fn indirect_loc(id: u32, addr: RegRef, addr_imm: i16) -> Result<(u64, u64), BackendError> {
    if addr.sub_reg_num >= 16 {
        return Err(overflow(id, "addr_subreg", addr.sub_reg_num as u64, 4));
    }
    if !(-128..=127).contains(&addr_imm) {
        return Err(BackendError::FieldOverflow { id, field: "addr_imm", value: addr_imm as i64, bits: 8 });
    }
    let loc = ((addr.sub_reg_num as u64) << 8) | (addr_imm as i8 as u8) as u64;
    Ok((FILE_INDIRECT, loc))
}

fn macro_loc(id: u32, reg_name: RegName, reg_num: u16, mme: u8) -> Result<(u64, u64), BackendError> {
    let (file, loc) = reg_loc(id, reg_name, RegRef::new(reg_num, 0), IsaType::UB)?;
    Ok((file, loc | mme as u64))
}

/// (file, loc, horz, type) of a destination.
fn dst_fields(id: u32, dst: &Destination) -> Result<(u64, u64, u64, u64), BackendError> {
    let (file, loc, horz) = match *dst {
        Destination::Direct { reg_name, reg, horz, ty } => {
            let (file, loc) = reg_loc(id, reg_name, reg, ty)?;
            (file, loc, horz_code(id, horz)?)
        }
        Destination::Indirect { addr, addr_imm, horz, .. } => {
            let (file, loc) = indirect_loc(id, addr, addr_imm)?;
            (file, loc, horz_code(id, horz)?)
        }
        Destination::Macro { reg_name, reg_num, mme, .. } => {
            let (file, loc) = macro_loc(id, reg_name, reg_num, mme.code())?;
            (file, loc, 1)
        }
    };
    Ok((file, loc, horz, type_code(id, dst.ty(), "dst")?))
}

/// (file, loc) of a register source.
fn src_loc(id: u32, src: &Source) -> Result<(u64, u64), BackendError> {
    match *src {
        Source::Direct { reg_name, reg, ty, .. } => reg_loc(id, reg_name, reg, ty),
        Source::Indirect { addr, addr_imm, .. } => indirect_loc(id, addr, addr_imm),
        Source::Macro { reg_name, reg_num, mme, .. } => macro_loc(id, reg_name, reg_num, mme.code()),
        Source::Imm { .. } | Source::Label { .. } => Err(invalid(id, "expected a register source")),
    }
}

fn imm_bits(id: u32, value: ImmValue, bits: usize) -> Result<u64, BackendError> {
    let raw = value.raw_bits();
    if raw >> bits != 0 {
        return Err(overflow(id, "imm", raw, bits));
    }
    Ok(raw)
}

/// Condition modifier field; math and sync ops carry their function control here.
fn function_field(inst: &IsaInstruction) -> u64 {
    match inst.header.subfunction {
        sf @ (Subfunction::Math(_) | Subfunction::Sync(_)) => sf.code() as u64,
        _ => inst.header.flag_modifier as u64,
    }
}

fn write_header(w: &mut FieldWriter, inst: &IsaInstruction, compacted: bool) -> Result<(), BackendError> {
    let h = &inst.header;
    w.set_field(0..7, h.op.code() as u64, "opcode")?;
    w.set_field(7..15, inst.swsb.encode() as u64, "swsb")?;
    w.set_field(15..18, h.exec_size.code() as u64, "exec_size")?;
    w.set_field(18..21, h.chan_off.code() as u64, "chan_off")?;
    w.set_bit(21, h.mask_ctrl == MaskCtrl::NoMask, "mask_ctrl")?;
    w.set_field(22..26, h.predication.function as u64, "pred_ctrl")?;
    w.set_bit(26, h.predication.inverse, "pred_inv")?;
    w.set_field(27..28, h.flag_reg.reg_num as u64, "flag_reg")?;
    w.set_field(28..29, h.flag_reg.sub_reg_num as u64, "flag_subreg")?;
    w.set_bit(29, compacted, "cmpt")
}

/// 8-byte form, or `None` when the instruction has no compacted encoding.
fn compact_form(inst: &IsaInstruction) -> Option<u64> {
    let op = inst.op();
    if op.is_branching() || op.is_send_family() || op.is_ternary() || op == Op::Illegal {
        return None;
    }
    let mut rest = inst.opts;
    rest.remove(InstOptSet::COMPACTED);
    if !rest.is_empty() || inst.srcs[2].is_some() || (inst.srcs[0].is_none() && inst.srcs[1].is_some()) {
        return None;
    }

    let mut ty = None;
    let dst_reg = match inst.dst {
        None => 0,
        Some(Destination::Direct { reg_name: RegName::Grf, reg, horz: HorzStride::Hs1, ty: t })
            if reg.sub_reg_num == 0 =>
        {
            ty = Some(t);
            reg.reg_num
        }
        Some(_) => return None,
    };

    let mut regs = [0u16; 2];
    let mut regions = [3u64; 2];
    for (i, src) in inst.srcs[..2].iter().enumerate() {
        match src {
            None => {}
            Some(Source::Direct { reg_name: RegName::Grf, reg, region, ty: t, modifier: SrcModifier::None })
                if reg.sub_reg_num == 0 =>
            {
                if ty.is_some_and(|prev| prev != *t) {
                    return None;
                }
                ty = Some(*t);
                regs[i] = reg.reg_num;
                regions[i] = COMPACT_REGIONS.iter().position(|r| r == region)? as u64;
            }
            Some(_) => return None,
        }
    }

    let ty_code = match ty {
        Some(t) => t.reg_code()?,
        None => 0,
    };
    let mut w = FieldWriter::new(inst.id);
    write_header(&mut w, inst, true).ok()?;
    w.set_field(30..34, function_field(inst), "cond_modifier").ok()?;
    w.set_bit(34, inst.dst_modifier == DstModifier::Sat, "saturate").ok()?;
    w.set_field(35..39, ty_code as u64, "type").ok()?;
    w.set_field(39..41, regions[0], "src0_region").ok()?;
    w.set_field(41..43, regions[1], "src1_region").ok()?;
    w.set_field(43..50, dst_reg as u64, "dst").ok()?;
    w.set_field(50..57, regs[0] as u64, "src0").ok()?;
    w.set_field(57..64, regs[1] as u64, "src1").ok()?;
    Some(w.bits as u64)
}

fn encode_two_source(w: &mut FieldWriter, inst: &IsaInstruction) -> Result<(), BackendError> {
    let id = inst.id;
    w.set_field(30..34, function_field(inst), "cond_modifier")?;
    w.set_bit(34, inst.dst_modifier == DstModifier::Sat, "saturate")?;
    w.set_field(35..42, inst.opts.pack(&InstOptSet::ALU_CONTROLS), "controls")?;

    let (file, loc, horz, ty) = match &inst.dst {
        Some(dst) => dst_fields(id, dst)?,
        None => (FILE_ARF, NULL_LOC, 0, 0),
    };
    w.set_field(42..44, file, "dst_file")?;
    w.set_field(44..48, ty, "dst_type")?;
    w.set_field(48..50, horz, "dst_horz")?;
    w.set_field(50..62, loc, "dst")?;

    match &inst.srcs[0] {
        Some(Source::Imm { value, ty }) => {
            if inst.srcs[1].is_some() {
                return Err(invalid(id, "immediate must be the last source"));
            }
            w.set_field(64..66, FILE_IMM, "src0_file")?;
            w.set_field(66..70, type_code(id, *ty, "src0")?, "src0_type")?;
            w.set_field(96..128, imm_bits(id, *value, 32)?, "imm")?;
        }
        Some(src) => {
            let (file, loc) = src_loc(id, src)?;
            let region = src.region().and_then(Region::code).ok_or_else(|| invalid(id, "src0 region"))?;
            w.set_field(62..64, src.modifier() as u64, "src0_mod")?;
            w.set_field(64..66, file, "src0_file")?;
            w.set_field(66..70, type_code(id, src.ty(), "src0")?, "src0_type")?;
            w.set_field(76..84, region as u64, "src0_region")?;
            w.set_field(84..96, loc, "src0")?;
        }
        None => {
            w.set_field(64..66, FILE_ARF, "src0_file")?;
            w.set_field(84..96, NULL_LOC, "src0")?;
        }
    }

    match &inst.srcs[1] {
        Some(Source::Imm { value, ty }) => {
            w.set_field(70..72, FILE_IMM, "src1_file")?;
            w.set_field(72..76, type_code(id, *ty, "src1")?, "src1_type")?;
            w.set_field(96..128, imm_bits(id, *value, 32)?, "imm")?;
        }
        Some(src) => {
            let (file, loc) = src_loc(id, src)?;
            let region = src.region().and_then(Region::code).ok_or_else(|| invalid(id, "src1 region"))?;
            w.set_field(70..72, file, "src1_file")?;
            w.set_field(72..76, type_code(id, src.ty(), "src1")?, "src1_type")?;
            w.set_field(96..98, src.modifier() as u64, "src1_mod")?;
            w.set_field(98..106, region as u64, "src1_region")?;
            w.set_field(106..118, loc, "src1")?;
        }
        None => {
            if !matches!(inst.srcs[0], Some(Source::Imm { .. })) {
                w.set_field(70..72, FILE_ARF, "src1_file")?;
                w.set_field(106..118, NULL_LOC, "src1")?;
            }
        }
    }
    Ok(())
}

fn encode_three_source(w: &mut FieldWriter, inst: &IsaInstruction) -> Result<(), BackendError> {
    let id = inst.id;
    let is_dpas = matches!(inst.op(), Op::Dpas | Op::Dpasw);
    w.set_field(30..34, inst.header.flag_modifier as u64, "cond_modifier")?;
    w.set_bit(34, inst.dst_modifier == DstModifier::Sat, "saturate")?;
    w.set_field(35..42, inst.opts.pack(&InstOptSet::ALU_CONTROLS), "controls")?;
    w.set_field(42..50, inst.header.subfunction.code() as u64, "subfunction")?;

    let dst = inst.dst.as_ref().ok_or_else(|| invalid(id, "three-source instruction without destination"))?;
    let (file, loc, horz, ty) = dst_fields(id, dst)?;
    w.set_field(50..52, file, "dst_file")?;
    w.set_field(52..56, ty, "dst_type")?;
    w.set_field(56..58, horz, "dst_horz")?;
    w.set_field(58..70, loc, "dst")?;

    let shared = inst.srcs[0].as_ref().map(|s| s.ty()).ok_or_else(|| invalid(id, "missing src0"))?;
    w.set_field(70..74, type_code(id, shared, "src0")?, "src_type")?;

    for (i, src) in inst.srcs.iter().enumerate() {
        let base = 74 + 18 * i;
        let src = src.as_ref().ok_or_else(|| invalid(id, format!("missing src{i}")))?;
        if let Source::Imm { value, .. } = src {
            w.set_field(base..base + 2, FILE_IMM, "src_file")?;
            w.set_field(base + 2..base + 18, imm_bits(id, *value, 16)?, "imm")?;
            continue;
        }
        let (file, loc) = src_loc(id, src)?;
        w.set_field(base..base + 2, file, "src_file")?;
        w.set_field(base + 6..base + 18, loc, "src")?;
        if is_dpas && i > 0 {
            let precision = src
                .ty()
                .precision_code()
                .ok_or_else(|| invalid(id, format!("src{i} type {:?} is not a systolic precision", src.ty())))?;
            w.set_field(base + 2..base + 6, precision as u64, "precision")?;
        } else {
            if src.ty() != shared {
                return Err(invalid(id, "three-source operands must share one type"));
            }
            let horz = src.region().map(|r| r.horz).unwrap_or(HorzStride::Hs0);
            w.set_field(base + 2..base + 4, src.modifier() as u64, "src_mod")?;
            w.set_field(base + 4..base + 6, horz_code(id, horz)?, "src_horz")?;
        }
    }
    Ok(())
}

fn encode_send(w: &mut FieldWriter, inst: &IsaInstruction, unified_send: bool) -> Result<(), BackendError> {
    let id = inst.id;
    let opts = inst.opts;
    w.set_field(30..34, inst.header.subfunction.code() as u64, "sfid")?;
    w.set_bit(34, opts.contains(InstOptSet::EOT), "eot")?;
    w.set_bit(35, opts.contains(InstOptSet::NO_SRC_DEP_SET), "no_src_dep_set")?;
    w.set_bit(36, opts.contains(InstOptSet::SERIALIZE), "serialize")?;

    match inst.dst {
        None | Some(Destination::Direct { reg_name: RegName::ArfNull, .. }) => {
            w.set_bit(39, true, "dst_null")?;
        }
        Some(Destination::Direct { reg_name: RegName::Grf, reg, ty, .. }) => {
            w.set_bit(40, ty == IsaType::HF, "dst_half")?;
            w.set_field(41..49, reg.reg_num as u64, "dst")?;
        }
        Some(_) => return Err(invalid(id, "send destination must be a direct GRF or null")),
    }

    for (i, range) in [(0, 49..57), (1, 57..65)] {
        match inst.srcs[i] {
            Some(Source::Direct { reg_name: RegName::Grf, reg, .. }) => {
                w.set_field(range, reg.reg_num as u64, "payload")?
            }
            None | Some(Source::Direct { reg_name: RegName::ArfNull, .. }) if i == 1 => {}
            _ => return Err(invalid(id, format!("send src{i} must be a direct GRF"))),
        }
    }
    w.set_field(65..70, inst.src1_length as u64, "src1_length")?;

    match inst.ex_desc {
        Some(SendDesc::Imm(v)) => {
            if v & 0x10 != 0 {
                return Err(invalid(id, format!("extended descriptor {v:#x} sets reserved bit 4")));
            }
            if unified_send && v & 0x2F != 0 {
                return Err(invalid(
                    id,
                    format!("extended descriptor {v:#x} still carries function id or EOT bits"),
                ));
            }
            w.set_field(70..96, (v >> 6) as u64, "ex_desc")?;
        }
        Some(SendDesc::Reg32A { sub_reg }) => {
            w.set_bit(38, true, "ex_desc_reg")?;
            w.set_field(70..74, sub_reg as u64, "ex_desc_a0")?;
            w.set_bit(74, opts.contains(InstOptSet::CPS), "cps")?;
            w.set_bit(75, opts.contains(InstOptSet::EXBSO), "exbso")?;
        }
        None => return Err(invalid(id, "send without extended descriptor")),
    }

    match inst.desc {
        Some(SendDesc::Imm(v)) => w.set_field(96..128, v as u64, "desc"),
        Some(SendDesc::Reg32A { sub_reg }) => {
            w.set_bit(37, true, "desc_reg")?;
            w.set_field(96..100, sub_reg as u64, "desc_a0")
        }
        None => Err(invalid(id, "send without message descriptor")),
    }
}

fn encode_branch(
    w: &mut FieldWriter,
    inst: &IsaInstruction,
    pc: u32,
    block_pcs: &[Option<u32>],
) -> Result<(), BackendError> {
    let id = inst.id;
    w.set_bit(30, inst.branch_ctrl == BranchCtrl::On, "branch_ctrl")?;
    w.set_field(31..38, inst.opts.pack(&InstOptSet::ALU_CONTROLS), "controls")?;

    if let Some(dst) = &inst.dst {
        let (file, loc, _, ty) = dst_fields(id, dst)?;
        let kind = if file == FILE_GRF { 1 } else { 2 };
        w.set_field(40..42, kind, "dst_kind")?;
        w.set_field(42..54, loc, "dst")?;
        w.set_field(54..58, ty, "dst_type")?;
    }

    let displacement = |block: BlockId| -> Result<i64, BackendError> {
        let target = block_pcs
            .get(block.0 as usize)
            .copied()
            .flatten()
            .ok_or(BackendError::UnappendedBlock { id, block: block.0 })?;
        Ok(target as i64 - pc as i64)
    };

    for (i, range) in [(0, 64..96), (1, 96..128)] {
        match &inst.srcs[i] {
            None => {}
            Some(Source::Label { block, .. }) => {
                if i == 0 {
                    w.set_field(38..40, 1, "src0_kind")?;
                }
                w.set_signed(range, displacement(*block)?, if i == 0 { "jip" } else { "uip" })?;
            }
            Some(src @ Source::Direct { .. }) if i == 0 => {
                let (file, loc) = src_loc(id, src)?;
                w.set_field(38..40, if file == FILE_GRF { 2 } else { 3 }, "src0_kind")?;
                w.set_field(58..62, type_code(id, src.ty(), "src0")?, "src0_type")?;
                w.set_field(64..76, loc, "src0")?;
            }
            Some(_) => return Err(invalid(id, format!("branch src{i} has no encoding"))),
        }
    }
    Ok(())
}

/// In-crate implementation of [`IsaBackend`].
#[derive(Debug, Clone)]
pub struct ReferenceEncoder {
    features: PlatformFeatures,
    insts: Vec<IsaInstruction>,
    blocks: Vec<Vec<InstHandle>>,
    order: Vec<BlockId>,
    appended: Vec<bool>,
}

impl ReferenceEncoder {
    pub fn new(platform: Platform) -> Self {
        Self {
            features: platform.features(),
            insts: Vec::new(),
            blocks: Vec::new(),
            order: Vec::new(),
            appended: Vec::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.features.platform
    }

    /// Appended blocks in program order.
    pub fn block_order(&self) -> &[BlockId] {
        &self.order
    }

    pub fn block_instructions(&self, block: BlockId) -> &[InstHandle] {
        self.blocks.get(block.0 as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn create(&mut self, inst: IsaInstruction) -> InstHandle {
        self.insts.push(inst);
        InstHandle(self.insts.len() as u32 - 1)
    }

    fn program_order(&self) -> Vec<InstHandle> {
        self.order.iter().flat_map(|b| self.block_instructions(*b).iter().copied()).collect()
    }

    fn insert_dependencies(&mut self, order: &[InstHandle]) {
        let mut last_write: Option<u16> = None;
        for h in order {
            let inst = &mut self.insts[h.0 as usize];
            let in_order = inst.op().inst_type() == InstType::Others;
            if in_order && !inst.swsb.has_swsb() {
                if let Some(reg) = last_write {
                    if inst.srcs.iter().flatten().any(|s| s.grf() == Some(reg)) {
                        inst.swsb = Swsb { dist_type: DistType::RegDist, min_dist: 1, ..Swsb::default() };
                        trace!("auto dependency on r{reg} for instruction {}", inst.id);
                    }
                }
            }
            last_write = if in_order { inst.dst.and_then(|d| d.grf()) } else { None };
        }
    }

    fn encode_native(
        &self,
        inst: &IsaInstruction,
        pc: u32,
        block_pcs: &[Option<u32>],
    ) -> Result<u128, BackendError> {
        let mut w = FieldWriter::new(inst.id);
        write_header(&mut w, inst, false)?;
        let op = inst.op();
        if op.is_send_family() {
            encode_send(&mut w, inst, self.features.unified_send)?;
        } else if op.is_branching() {
            encode_branch(&mut w, inst, pc, block_pcs)?;
        } else if inst.num_srcs() == 3 {
            encode_three_source(&mut w, inst)?;
        } else {
            encode_two_source(&mut w, inst)?;
        }
        Ok(w.bits)
    }
}

impl IsaBackend for ReferenceEncoder {
    fn create_block(&mut self) -> BlockId {
        self.blocks.push(Vec::new());
        self.appended.push(false);
        BlockId(self.blocks.len() as u32 - 1)
    }

    fn append_block(&mut self, block: BlockId) {
        if let Some(appended) = self.appended.get_mut(block.0 as usize) {
            if !*appended {
                *appended = true;
                self.order.push(block);
            }
        }
    }

    fn create_basic_instruction(&mut self, header: InstHeader) -> InstHandle {
        self.create(IsaInstruction::new(header))
    }

    fn create_branch_instruction(&mut self, header: InstHeader, branch_ctrl: BranchCtrl) -> InstHandle {
        let mut inst = IsaInstruction::new(header);
        inst.set_branch_ctrl(branch_ctrl);
        self.create(inst)
    }

    fn create_send_instruction(&mut self, header: InstHeader, ex_desc: SendDesc, desc: SendDesc) -> InstHandle {
        let mut inst = IsaInstruction::new(header);
        inst.ex_desc = Some(ex_desc);
        inst.desc = Some(desc);
        self.create(inst)
    }

    fn create_nop(&mut self) -> InstHandle {
        self.create(IsaInstruction::new(InstHeader::new(Op::Nop, ExecSize::Simd1)))
    }

    fn create_illegal(&mut self) -> InstHandle {
        self.create(IsaInstruction::new(InstHeader::new(Op::Illegal, ExecSize::Simd1)))
    }

    fn instruction(&self, inst: InstHandle) -> Option<&IsaInstruction> {
        self.insts.get(inst.0 as usize)
    }

    fn instruction_mut(&mut self, inst: InstHandle) -> Option<&mut IsaInstruction> {
        self.insts.get_mut(inst.0 as usize)
    }

    fn append_instruction(&mut self, block: BlockId, inst: InstHandle) -> Result<(), BackendError> {
        if inst.0 as usize >= self.insts.len() {
            return Err(BackendError::UnknownInstruction(inst.0));
        }
        let insts = self.blocks.get_mut(block.0 as usize).ok_or(BackendError::UnknownBlock(block.0))?;
        insts.push(inst);
        Ok(())
    }

    fn encode(&mut self, options: &BackendEncodeOptions) -> Result<EncodedBinary, BackendError> {
        let order = self.program_order();
        for h in &order {
            let inst = &self.insts[h.0 as usize];
            inst.validate().map_err(|reason| BackendError::InvalidInstruction { id: inst.id, reason })?;
        }

        if options.auto_deps && options.swsb_mode != SwsbEncodeMode::Invalid {
            self.insert_dependencies(&order);
        }
        let swsb_features = PlatformFeatures { swsb_mode: options.swsb_mode, ..self.features };
        for h in &order {
            let inst = &self.insts[h.0 as usize];
            inst.swsb
                .verify(&swsb_features, inst.op().inst_type())
                .map_err(|reason| BackendError::InvalidDependency { id: inst.id, reason })?;
        }

        // Layout: every block starts where the previous one ended.
        let mut pcs = vec![None; self.insts.len()];
        let mut block_pcs = vec![None; self.blocks.len()];
        let mut layout = Vec::with_capacity(order.len());
        let mut pc = 0u32;
        for block in &self.order {
            block_pcs[block.0 as usize] = Some(pc);
            for h in self.block_instructions(*block) {
                let inst = &self.insts[h.0 as usize];
                let wants_compact = !inst.opts.contains(InstOptSet::NO_COMPACT)
                    && (options.auto_compact || inst.opts.contains(InstOptSet::COMPACTED));
                let compact = if wants_compact { compact_form(inst) } else { None };
                if inst.opts.contains(InstOptSet::COMPACTED) && compact.is_none() {
                    trace!("instruction {} has no compacted form, encoding native", inst.id);
                }
                pcs[h.0 as usize] = Some(pc);
                layout.push((*h, pc, compact));
                pc += if compact.is_some() { COMPACT_SIZE } else { NATIVE_SIZE };
            }
        }

        let mut bytes = Vec::with_capacity(pc as usize);
        let mut compacted = 0;
        for (h, inst_pc, compact) in layout {
            match compact {
                Some(word) => {
                    bytes.extend_from_slice(&word.to_le_bytes());
                    compacted += 1;
                }
                None => {
                    let word = self.encode_native(&self.insts[h.0 as usize], inst_pc, &block_pcs)?;
                    bytes.extend_from_slice(&word.to_le_bytes());
                }
            }
        }

        debug!(
            "encoded {} blocks, {} instructions ({} compacted) into {} bytes for {}",
            self.order.len(),
            order.len(),
            compacted,
            bytes.len(),
            self.features.platform
        );
        Ok(EncodedBinary { bytes, pcs, compacted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::op::SfId;

    fn options() -> BackendEncodeOptions {
        BackendEncodeOptions { auto_compact: false, swsb_mode: SwsbEncodeMode::Invalid, auto_deps: false }
    }

    fn grf(reg: u16) -> Source {
        Source::Direct {
            reg_name: RegName::Grf,
            reg: RegRef::new(reg, 0),
            region: Region::new(VertStride::Vs8, Width::W8, HorzStride::Hs1),
            ty: IsaType::F,
            modifier: SrcModifier::None,
        }
    }

    fn add(enc: &mut ReferenceEncoder, dst: u16, a: u16, b: u16) -> InstHandle {
        let h = enc.create_basic_instruction(InstHeader::new(Op::Add, ExecSize::Simd8));
        let inst = enc.instruction_mut(h).expect("handle");
        inst.set_direct_destination(DstModifier::None, RegName::Grf, RegRef::new(dst, 0), HorzStride::Hs1, IsaType::F);
        inst.set_source(0, grf(a));
        inst.set_source(1, grf(b));
        h
    }

    #[test]
    fn native_and_compact_sizes() {
        let mut enc = ReferenceEncoder::new(Platform::Skl);
        let b = enc.create_block();
        enc.append_block(b);
        let h0 = add(&mut enc, 10, 2, 3);
        let h1 = add(&mut enc, 11, 4, 5);
        enc.instruction_mut(h1).expect("handle").add_inst_opts(InstOptSet::NO_COMPACT);
        enc.append_instruction(b, h0).expect("append");
        enc.append_instruction(b, h1).expect("append");

        let bin = enc.encode(&BackendEncodeOptions { auto_compact: true, ..options() }).expect("encode");
        assert_eq!(bin.len(), 24);
        assert_eq!(bin.compacted, 1);
        assert_eq!(bin.pc(h0), Some(0));
        assert_eq!(bin.pc(h1), Some(8));
        // compaction control bit
        assert_eq!(bin.bytes[3] & 0x20, 0x20);
    }

    #[test]
    fn branch_to_unappended_block_is_rejected() {
        let mut enc = ReferenceEncoder::new(Platform::Skl);
        let b0 = enc.create_block();
        let b1 = enc.create_block();
        enc.append_block(b0);
        let h = enc.create_branch_instruction(InstHeader::new(Op::Jmpi, ExecSize::Simd1), BranchCtrl::Off);
        enc.instruction_mut(h).expect("handle").set_label_source(0, b1, IsaType::UD);
        enc.append_instruction(b0, h).expect("append");

        let err = enc.encode(&options()).unwrap_err();
        assert_eq!(err, BackendError::UnappendedBlock { id: 0, block: 1 });
    }

    #[test]
    fn label_displacement_is_relative() {
        let mut enc = ReferenceEncoder::new(Platform::Skl);
        let b0 = enc.create_block();
        let b1 = enc.create_block();
        enc.append_block(b0);
        enc.append_block(b1);
        let h = enc.create_branch_instruction(InstHeader::new(Op::Jmpi, ExecSize::Simd1), BranchCtrl::Off);
        enc.instruction_mut(h).expect("handle").set_label_source(0, b1, IsaType::UD);
        enc.append_instruction(b0, h).expect("append");
        let nop = enc.create_nop();
        enc.append_instruction(b0, nop).expect("append");
        let tail = enc.create_nop();
        enc.append_instruction(b1, tail).expect("append");

        let bin = enc.encode(&options()).expect("encode");
        let word = u128::from_le_bytes(bin.bytes[0..16].try_into().expect("16 bytes"));
        assert_eq!((word >> 64) as u32, 32);
        assert_eq!(bin.pc(tail), Some(32));
    }

    #[test]
    fn unified_send_rejects_uncleared_ex_desc() {
        let mut enc = ReferenceEncoder::new(Platform::Tgllp);
        let b = enc.create_block();
        enc.append_block(b);
        let mut header = InstHeader::new(Op::Send, ExecSize::Simd8);
        header.subfunction = Subfunction::Send(SfId::Dc0);
        let h = enc.create_send_instruction(header, SendDesc::Imm(0x2F), SendDesc::Imm(0x0210_0000));
        {
            let inst = enc.instruction_mut(h).expect("handle");
            inst.set_direct_destination(DstModifier::None, RegName::Grf, RegRef::new(20, 0), HorzStride::Hs1, IsaType::UD);
            inst.set_source(0, grf(4));
        }
        enc.append_instruction(b, h).expect("append");
        assert!(matches!(enc.encode(&options()), Err(BackendError::InvalidInstruction { .. })));

        enc.instruction_mut(h).expect("handle").ex_desc = Some(SendDesc::Imm(0x40));
        let bin = enc.encode(&options()).expect("encode");
        let word = u128::from_le_bytes(bin.bytes[0..16].try_into().expect("16 bytes"));
        assert_eq!((word >> 70) & 0x3FF_FFFF, 1);
        assert_eq!((word >> 96) as u32, 0x0210_0000);
    }

    #[test]
    fn auto_dependencies_on_read_after_write() {
        let mut enc = ReferenceEncoder::new(Platform::Tgllp);
        let b = enc.create_block();
        enc.append_block(b);
        let h0 = add(&mut enc, 10, 2, 3);
        let h1 = add(&mut enc, 11, 10, 5);
        enc.append_instruction(b, h0).expect("append");
        enc.append_instruction(b, h1).expect("append");

        let opts = BackendEncodeOptions { swsb_mode: SwsbEncodeMode::SingleDistPipe, auto_deps: true, ..options() };
        enc.encode(&opts).expect("encode");
        assert!(!enc.instruction(h0).expect("handle").swsb.has_swsb());
        let sw = enc.instruction(h1).expect("handle").swsb;
        assert_eq!((sw.dist_type, sw.min_dist), (DistType::RegDist, 1));
    }

    #[test]
    fn immediate_wider_than_field_is_rejected() {
        let mut enc = ReferenceEncoder::new(Platform::Skl);
        let b = enc.create_block();
        enc.append_block(b);
        let h = enc.create_basic_instruction(InstHeader::new(Op::Mov, ExecSize::Simd1));
        {
            let inst = enc.instruction_mut(h).expect("handle");
            inst.set_direct_destination(DstModifier::None, RegName::Grf, RegRef::new(1, 0), HorzStride::Hs1, IsaType::DF);
            inst.set_immediate_source(0, ImmValue::F64(0x4000_0000_0000_0000), IsaType::DF);
        }
        enc.append_instruction(b, h).expect("append");
        assert!(matches!(
            enc.encode(&options()),
            Err(BackendError::FieldOverflow { field: "imm", .. })
        ));
    }
}
