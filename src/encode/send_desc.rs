// This module produces the descriptor pair of a send-class instruction. The message
// descriptor is either an immediate or an a0 address-register reference taken from its source
// slot. Unary sends carry their extended descriptor packed into the message shape; split
// sends carry it in source slot 3 as an immediate or an address register. On platforms with
// the unified send encoding the shared-function id and end-of-thread bits move into fixed
// instruction fields, so they are cleared from any immediate extended descriptor handed to
// the backend. A register extended descriptor selects the extended base-scale-offset
// addressing when the bindless format is configured, together with the coarse pixel shading
// option when the message enables it. The second-source length always comes from the
// message shape.

//! Send descriptor encoding.

use log::trace;

use crate::core::error::{EmitResult, OperandSlot};
use crate::core::options::EncoderOptions;
use crate::core::platform::PlatformFeatures;
use crate::isa::{InstOptSet, SendDesc};
use crate::mir::{ArchReg, Instruction, MsgDesc, Operand, RegFile};

use super::operand_map::Site;

/// Function id bits [3:0] and EOT bit 5 of a unary extended descriptor.
const UNARY_EX_DESC_FIXED_BITS: u32 = 0xF | 0x20;

/// Low six bits of a split-send immediate extended descriptor.
const SPLIT_EX_DESC_FIXED_BITS: u32 = 0x3F;

/// Descriptor pair plus what the send instruction takes from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendDescriptors {
    pub desc: SendDesc,
    pub ex_desc: SendDesc,
    pub src1_length: u8,
    /// Options implied by the extended descriptor addressing.
    pub opts: InstOptSet,
}

pub fn encode_send_descriptors(
    inst: &Instruction,
    features: &PlatformFeatures,
    options: &EncoderOptions,
) -> EmitResult<SendDescriptors> {
    let site = Site::new(inst.position, inst.opcode.name(), OperandSlot::Inst);
    let Some(msg) = inst.msg else {
        return Err(site.illegal("msg", "send without message descriptor"));
    };

    let desc_slot = if inst.is_split_send() { 2 } else { 1 };
    let desc = match inst.desc_operand() {
        Some(op) => descriptor(site.with_slot(OperandSlot::Src(desc_slot)), op)?,
        None => return Err(site.illegal("desc", "missing message descriptor operand")),
    };

    let encoded = if inst.is_split_send() {
        let (ex_desc, opts) = split_ex_desc(inst, &msg, features, options, site)?;
        SendDescriptors { desc, ex_desc, src1_length: msg.ext_msg_length, opts }
    } else {
        let ex_desc = if features.unified_send {
            msg.ext_desc & !UNARY_EX_DESC_FIXED_BITS
        } else {
            msg.ext_desc
        };
        SendDescriptors {
            desc,
            ex_desc: SendDesc::Imm(ex_desc),
            src1_length: 0,
            opts: InstOptSet::empty(),
        }
    };
    trace!(
        "send at {}: desc {:?} ex_desc {:?} src1_length {}",
        inst.position,
        encoded.desc,
        encoded.ex_desc,
        encoded.src1_length
    );
    Ok(encoded)
}

fn split_ex_desc(
    inst: &Instruction,
    msg: &MsgDesc,
    features: &PlatformFeatures,
    options: &EncoderOptions,
    site: Site,
) -> EmitResult<(SendDesc, InstOptSet)> {
    let site = site.with_slot(OperandSlot::Src(3));
    let mut opts = InstOptSet::empty();
    let ex_desc = match inst.ex_desc_operand() {
        Some(Operand::Imm(imm)) => {
            let bits = imm.bits as u32;
            if features.unified_send {
                SendDesc::Imm(bits & !SPLIT_EX_DESC_FIXED_BITS)
            } else {
                SendDesc::Imm(bits)
            }
        }
        Some(Operand::Reg(reg)) if reg.file == RegFile::Arf(ArchReg::A0) => {
            if options.use_extended_descriptor_bindless_format {
                opts.insert(InstOptSet::EXBSO);
                if msg.cps_enabled {
                    opts.insert(InstOptSet::CPS);
                }
            }
            SendDesc::Reg32A { sub_reg: reg.sub_reg }
        }
        Some(_) => return Err(site.illegal("ex_desc", "must be an immediate or a0 register")),
        None => return Err(site.illegal("ex_desc", "missing extended descriptor operand")),
    };
    Ok((ex_desc, opts))
}

fn descriptor(site: Site, op: &Operand) -> EmitResult<SendDesc> {
    match op {
        Operand::Imm(imm) => Ok(SendDesc::Imm(imm.bits as u32)),
        Operand::Reg(reg) if reg.file == RegFile::Arf(ArchReg::A0) => {
            Ok(SendDesc::Reg32A { sub_reg: reg.sub_reg })
        }
        _ => Err(site.illegal("desc", "must be an immediate or a0 register")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;
    use crate::mir::{DataType, Opcode, RegionDesc, Sfid, SrcRegion};

    fn unary(ext_desc: u32) -> Instruction {
        let mut msg = MsgDesc::new(Sfid::DpDc1);
        msg.ext_desc = ext_desc;
        Instruction::new(Opcode::Send, 8)
            .with_src(SrcRegion::grf(2, 0, RegionDesc::contiguous8(), DataType::UD))
            .with_src(Operand::imm(0x0240_3000, DataType::UD))
            .with_msg(msg)
    }

    #[test]
    fn unary_ex_desc_drops_fixed_fields_on_unified_send() {
        let inst = unary(0x0000_1C2F);
        let opts = EncoderOptions::default();
        let xe = encode_send_descriptors(&inst, &Platform::Tgllp.features(), &opts).unwrap();
        assert_eq!(xe.ex_desc, SendDesc::Imm(0x0000_1C00));
        assert_eq!(xe.desc, SendDesc::Imm(0x0240_3000));
        let gen9 = encode_send_descriptors(&inst, &Platform::Skl.features(), &opts).unwrap();
        assert_eq!(gen9.ex_desc, SendDesc::Imm(0x0000_1C2F));
        assert_eq!(gen9.src1_length, 0);
    }

    #[test]
    fn missing_message_shape() {
        let inst = Instruction::new(Opcode::Send, 8)
            .with_src(SrcRegion::grf(2, 0, RegionDesc::contiguous8(), DataType::UD))
            .with_src(Operand::imm(0, DataType::UD));
        let err = encode_send_descriptors(&inst, &Platform::Skl.features(), &EncoderOptions::default());
        assert!(err.is_err());
    }
}
