// This test suite exercises the send descriptor encoder on its own and through complete
// kernels. On platforms with the unified send encoding the shared-function id and
// end-of-thread bits live in dedicated instruction fields, so an immediate extended
// descriptor must reach the backend with its low six bits cleared for split sends and with
// bits [3:0] and 5 cleared for unary sends; older platforms get the value untouched. A
// register extended descriptor selects extended base-scale-offset addressing only when the
// bindless format is configured, adding coarse pixel shading when the message enables it.
// The second-source length always comes from the message shape. Payload types are left
// to the backend, except that 16-bit data through a register descriptor retypes the
// destination (returns) or the first payload (inputs) as half float on the platforms that
// need it. The
// end-to-end tests confirm that the reference backend, which rejects uncleared unified
// descriptors, accepts what the encoder hands it.

//! Test send descriptor encoding.

use bumpalo::Bump;
use genemit::encode::{encode_send_descriptors, Translator};
use genemit::isa::{InstOptSet, IsaBackend, IsaType, Op, SendDesc};
use genemit::mir::{
    ArchReg, DataType, DstRegion, InstOpts, Instruction, Kernel, MsgDesc, Opcode, Operand,
    RegionDesc, Sfid, SrcRegion,
};
use genemit::{encode_kernel, EmitError, EmitSession, EncoderOptions, OperandSlot, Platform, ReferenceEncoder};

fn payload(reg: u16) -> SrcRegion {
    SrcRegion::grf(reg, 0, RegionDesc::contiguous8(), DataType::UD)
}

fn a0(sub_reg: u16) -> SrcRegion {
    SrcRegion::arf(ArchReg::A0, 0, sub_reg, RegionDesc::scalar(), DataType::UD)
}

fn split_send(ex_desc: impl Into<Operand>, msg: MsgDesc) -> Instruction {
    Instruction::new(Opcode::Sends, 8)
        .with_dst(DstRegion::grf(20, 0, 1, DataType::UD))
        .with_src(payload(2))
        .with_src(payload(4))
        .with_src(Operand::imm(0x0220_0000, DataType::UD))
        .with_src(ex_desc)
        .with_msg(msg)
}

fn unary_send(desc: impl Into<Operand>, msg: MsgDesc) -> Instruction {
    Instruction::new(Opcode::Send, 8)
        .with_dst(DstRegion::grf(20, 0, 1, DataType::UW))
        .with_src(payload(2))
        .with_src(desc)
        .with_msg(msg)
}

#[test]
fn split_immediate_ex_desc_is_cleared_on_unified_platforms() {
    let options = EncoderOptions::default();
    let msg = MsgDesc::new(Sfid::DpDc1);
    for value in [0x3Fu32, 0x1234_56FF, 0x20, 0xF, 0x0000_1C00, 0xFFFF_FFC0] {
        let inst = split_send(Operand::imm(value as u64, DataType::UD), msg);

        let tgl = encode_send_descriptors(&inst, &Platform::Tgllp.features(), &options).unwrap();
        let SendDesc::Imm(cleared) = tgl.ex_desc else { panic!("register ex_desc") };
        assert_eq!(cleared & 0x3F, 0, "{value:#x}");
        assert_eq!(cleared & !0x3F, value & !0x3F, "{value:#x}");

        let skl = encode_send_descriptors(&inst, &Platform::Skl.features(), &options).unwrap();
        assert_eq!(skl.ex_desc, SendDesc::Imm(value));
    }
}

#[test]
fn unary_ex_desc_keeps_bit_four() {
    let mut msg = MsgDesc::new(Sfid::Sampler);
    msg.ext_desc = 0x1C3F;
    let inst = unary_send(Operand::imm(0x0240_3000, DataType::UD), msg);

    let tgl = encode_send_descriptors(&inst, &Platform::Tgllp.features(), &EncoderOptions::default()).unwrap();
    assert_eq!(tgl.ex_desc, SendDesc::Imm(0x1C10));
    assert_eq!(tgl.desc, SendDesc::Imm(0x0240_3000));
    assert_eq!(tgl.src1_length, 0);
}

#[test]
fn second_source_length_comes_from_message() {
    let mut msg = MsgDesc::new(Sfid::DpDc1);
    msg.ext_msg_length = 3;
    let inst = split_send(Operand::imm(0, DataType::UD), msg);
    for platform in [Platform::Skl, Platform::Tgllp] {
        let descs = encode_send_descriptors(&inst, &platform.features(), &EncoderOptions::default()).unwrap();
        assert_eq!(descs.src1_length, 3);
    }
}

#[test]
fn register_ex_desc_addressing_options() {
    let mut msg = MsgDesc::new(Sfid::DpDc1);
    msg.cps_enabled = true;
    let inst = split_send(a0(2), msg);
    let features = Platform::Tgllp.features();

    let plain = encode_send_descriptors(&inst, &features, &EncoderOptions::default()).unwrap();
    assert_eq!(plain.ex_desc, SendDesc::Reg32A { sub_reg: 2 });
    assert!(plain.opts.is_empty());

    let bindless = EncoderOptions::default().with_extended_descriptor_bindless_format(true);
    let with_cps = encode_send_descriptors(&inst, &features, &bindless).unwrap();
    assert!(with_cps.opts.contains(InstOptSet::EXBSO));
    assert!(with_cps.opts.contains(InstOptSet::CPS));

    msg.cps_enabled = false;
    let no_cps = encode_send_descriptors(&split_send(a0(2), msg), &features, &bindless).unwrap();
    assert!(no_cps.opts.contains(InstOptSet::EXBSO));
    assert!(!no_cps.opts.contains(InstOptSet::CPS));
}

#[test]
fn descriptor_operands_must_be_immediate_or_a0() {
    let msg = MsgDesc::new(Sfid::DpDc1);
    let inst = split_send(payload(8), msg);
    assert!(matches!(
        encode_send_descriptors(&inst, &Platform::Tgllp.features(), &EncoderOptions::default()),
        Err(EmitError::IllegalOperandEncoding { slot: OperandSlot::Src(3), field: "ex_desc", .. })
    ));

    let inst = unary_send(payload(8), msg);
    assert!(matches!(
        encode_send_descriptors(&inst, &Platform::Skl.features(), &EncoderOptions::default()),
        Err(EmitError::IllegalOperandEncoding { slot: OperandSlot::Src(1), field: "desc", .. })
    ));

    let mut no_msg = unary_send(Operand::imm(0, DataType::UD), msg);
    no_msg.msg = None;
    assert!(matches!(
        encode_send_descriptors(&no_msg, &Platform::Skl.features(), &EncoderOptions::default()),
        Err(EmitError::IllegalOperandEncoding { field: "msg", .. })
    ));
}

#[test]
fn half_return_through_register_descriptor_retypes_destination() {
    let mut msg = MsgDesc::new(Sfid::Sampler);
    msg.half_return = true;
    let reg_desc = unary_send(a0(0), msg);
    let imm_desc = unary_send(Operand::imm(0x0240_3000, DataType::UD), msg);

    let dst_type = |platform: Platform, inst: &Instruction| {
        let mut backend = ReferenceEncoder::new(platform);
        let mut tr = Translator::new(&mut backend, platform.features(), EncoderOptions::default());
        let out = tr.translate(inst).unwrap();
        tr.backend().instruction(out.handle).unwrap().dst.unwrap().ty()
    };

    assert_eq!(dst_type(Platform::Skl, &reg_desc), IsaType::HF);
    assert_eq!(dst_type(Platform::Skl, &imm_desc), IsaType::UW);
    assert_eq!(dst_type(Platform::Bdw, &reg_desc), IsaType::UW);
    assert_eq!(dst_type(Platform::Tgllp, &reg_desc), IsaType::UW);
}

#[test]
fn payload_types_are_left_to_the_backend() {
    let mut msg = MsgDesc::new(Sfid::Sampler);
    msg.half_input = true;

    let src_types = |platform: Platform, inst: &Instruction| {
        let mut backend = ReferenceEncoder::new(platform);
        let mut tr = Translator::new(&mut backend, platform.features(), EncoderOptions::default());
        let out = tr.translate(inst).unwrap();
        let isa = tr.backend().instruction(out.handle).unwrap().clone();
        (isa.srcs[0].map(|s| s.ty()), isa.srcs[1].map(|s| s.ty()))
    };

    // 16-bit payload through a register descriptor.
    let reg_desc = unary_send(a0(0), msg);
    assert_eq!(src_types(Platform::Skl, &reg_desc).0, Some(IsaType::HF));
    assert_eq!(src_types(Platform::Tgllp, &reg_desc).0, Some(IsaType::Invalid));
    let imm_desc = unary_send(Operand::imm(0x0240_3000, DataType::UD), msg);
    assert_eq!(src_types(Platform::Skl, &imm_desc).0, Some(IsaType::Invalid));

    // Only the first payload is retyped.
    let mut split = split_send(Operand::imm(0, DataType::UD), msg);
    split.srcs[2] = a0(0).into();
    assert_eq!(src_types(Platform::Skl, &split), (Some(IsaType::HF), Some(IsaType::Invalid)));

    msg.half_input = false;
    let plain = split_send(Operand::imm(0, DataType::UD), msg);
    assert_eq!(src_types(Platform::Skl, &plain), (Some(IsaType::Invalid), Some(IsaType::Invalid)));
}

#[test]
fn unified_unary_send_gets_null_second_source() {
    let msg = MsgDesc::new(Sfid::DpDc1);
    let inst = unary_send(Operand::imm(0x0240_3000, DataType::UD), msg);

    let mut backend = ReferenceEncoder::new(Platform::Tgllp);
    let mut tr = Translator::new(&mut backend, Platform::Tgllp.features(), EncoderOptions::default());
    let out = tr.translate(&inst).unwrap();
    assert_eq!(out.op, Op::Send);
    let isa = tr.backend().instruction(out.handle).unwrap();
    let src1 = isa.srcs[1].unwrap();
    assert!(src1.is_null());
    assert_eq!(src1.ty(), IsaType::Invalid);
    assert!(isa.srcs[2].is_none());
}

#[test]
fn split_send_kernel_encodes_on_every_send_generation() {
    let _ = env_logger::builder().is_test(true).try_init();
    let arena = Bump::new();
    let session = EmitSession::new(&arena);

    for platform in [Platform::Skl, Platform::Icllp, Platform::Tgllp, Platform::XeHpSdv] {
        let mut msg = MsgDesc::new(Sfid::DpDc1);
        msg.ext_msg_length = 2;
        // Bits [3:0] and 5 hold the function id and EOT only on the pre-Xe encoding.
        let ex_desc = if platform >= Platform::Tgllp { 0x0040_002C } else { 0x0040_0000 };

        let mut kernel = Kernel::new(format!("store_{}", platform.name()));
        let b = kernel.add_block();
        kernel.push(
            b,
            split_send(Operand::imm(ex_desc, DataType::UD), msg).with_options(InstOpts::EOT),
        );

        let out = encode_kernel(&session, &mut kernel, platform, EncoderOptions::default()).unwrap();
        assert_eq!(out.len(), 16, "{platform:?}");
        assert_eq!(out.asm_count, 1);
        // EOT lands in its own header bit.
        assert_eq!((out.binary[4] >> 2) & 1, 1);
    }
    assert_eq!(session.stats().kernels_encoded, 4);
}
