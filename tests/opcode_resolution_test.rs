// This test suite checks opcode resolution across every platform the encoder knows. Every
// mid-IR opcode is resolved twice, once strictly and once in permissive mode, and the two
// answers must agree: a resolved op is always one the platform encodes, and an opcode
// without a rule fails with UnsupportedOpcode and never with a different error kind. The
// generation-dependent rules are pinned individually: wait becomes sync.bar and split sends
// become unified sends from Xe on, register-sourced calls become calla where the platform
// has it, and pseudo opcodes fold into their real counterparts. The last tests drive whole
// kernels through encode_kernel to confirm that an unsupported opcode aborts emission and
// that encoder-owned intrinsics are dropped before translation.

//! Test opcode and subfunction resolution.

use bumpalo::Bump;
use genemit::encode::resolve_opcode;
use genemit::isa::{Op, Subfunction, SyncFc};
use genemit::mir::{
    DataType, DpasInfo, DstRegion, Instruction, Kernel, LoweringPhase, MathOp, MsgDesc, Opcode,
    Operand, Precision, RegionDesc, Sfid, SrcRegion,
};
use genemit::{encode_kernel, EmitError, EmitSession, EncoderOptions, Platform};

const ALL_OPCODES: &[Opcode] = &[
    Opcode::Illegal,
    Opcode::Mov,
    Opcode::Sel,
    Opcode::Movi,
    Opcode::Not,
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::Shr,
    Opcode::Shl,
    Opcode::Smov,
    Opcode::Asr,
    Opcode::Ror,
    Opcode::Rol,
    Opcode::Cmp,
    Opcode::Cmpn,
    Opcode::Csel,
    Opcode::Bfrev,
    Opcode::Bfe,
    Opcode::Bfi1,
    Opcode::Bfi2,
    Opcode::Jmpi,
    Opcode::Brd,
    Opcode::If,
    Opcode::Brc,
    Opcode::Else,
    Opcode::Endif,
    Opcode::While,
    Opcode::Break,
    Opcode::Cont,
    Opcode::Halt,
    Opcode::Call,
    Opcode::Return,
    Opcode::Goto,
    Opcode::Join,
    Opcode::Wait,
    Opcode::Send,
    Opcode::Sendc,
    Opcode::Sends,
    Opcode::Sendsc,
    Opcode::Math,
    Opcode::Add,
    Opcode::Mul,
    Opcode::Avg,
    Opcode::Frc,
    Opcode::Rndu,
    Opcode::Rndd,
    Opcode::Rnde,
    Opcode::Rndz,
    Opcode::Mac,
    Opcode::Mach,
    Opcode::Lzd,
    Opcode::Fbh,
    Opcode::Fbl,
    Opcode::Cbit,
    Opcode::Addc,
    Opcode::Subb,
    Opcode::Sad2,
    Opcode::Sada2,
    Opcode::Dp4,
    Opcode::Dph,
    Opcode::Dp3,
    Opcode::Dp2,
    Opcode::Dp4a,
    Opcode::Dpas,
    Opcode::Dpasw,
    Opcode::Add3,
    Opcode::Bfn,
    Opcode::Line,
    Opcode::Pln,
    Opcode::Mad,
    Opcode::Lrp,
    Opcode::Madm,
    Opcode::Nop,
    Opcode::Label,
    Opcode::PseudoMad,
    Opcode::Do,
    Opcode::PseudoAnd,
    Opcode::PseudoOr,
    Opcode::PseudoXor,
    Opcode::PseudoNot,
    Opcode::PseudoFcall,
    Opcode::PseudoFret,
    Opcode::PseudoSada2,
    Opcode::PseudoExit,
    Opcode::PseudoFcCall,
    Opcode::PseudoFcRet,
    Opcode::Intrinsic,
    Opcode::SyncNop,
    Opcode::SyncAllrd,
    Opcode::SyncAllwr,
    Opcode::Mulh,
    Opcode::Madw,
];

/// Instruction of `opcode` with whatever function controls it needs.
fn well_formed(opcode: Opcode) -> Instruction {
    let mut inst = Instruction::new(opcode, 8);
    match opcode {
        Opcode::Math => inst = inst.with_math(MathOp::Sqrt),
        Opcode::Dpas | Opcode::Dpasw => {
            inst = inst.with_dpas(DpasInfo {
                systolic_depth: 8,
                repeat_count: 8,
                src1_precision: Precision::S8,
                src2_precision: Precision::S8,
            })
        }
        op if op.is_send() => inst = inst.with_msg(MsgDesc::new(Sfid::DpDc1)),
        _ => {}
    }
    inst
}

fn never_resolves(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Label | Opcode::Do | Opcode::PseudoExit | Opcode::Intrinsic | Opcode::Mulh | Opcode::Madw
    )
}

#[test]
fn strict_and_permissive_resolution_agree() {
    for platform in Platform::ALL {
        let features = platform.features();
        for &opcode in ALL_OPCODES {
            let inst = well_formed(opcode);
            let permissive = resolve_opcode(&inst, &features, true)
                .unwrap_or_else(|e| panic!("{} on {platform:?}: {e}", opcode.name()));
            let strict = resolve_opcode(&inst, &features, false);

            match permissive {
                Some(resolved) => {
                    assert!(!never_resolves(opcode), "{} resolved on {platform:?}", opcode.name());
                    assert!(resolved.op.valid_on(platform), "{} -> {:?}", opcode.name(), resolved.op);
                    assert_eq!(strict, Ok(Some(resolved)));
                }
                None => match strict {
                    Err(EmitError::UnsupportedOpcode { opcode: name, platform: p, .. }) => {
                        assert_eq!(name, opcode.name());
                        assert_eq!(p, platform.name());
                    }
                    other => panic!("{} on {platform:?}: {other:?}", opcode.name()),
                },
            }
        }
    }
}

#[test]
fn opcodes_without_rules_are_unsupported_everywhere() {
    for platform in Platform::ALL {
        let features = platform.features();
        for opcode in ALL_OPCODES.iter().copied().filter(|o| never_resolves(*o)) {
            assert!(matches!(
                resolve_opcode(&well_formed(opcode), &features, false),
                Err(EmitError::UnsupportedOpcode { .. })
            ));
        }
    }
}

#[test]
fn generation_selects_encoding() {
    let resolve = |opcode, platform: Platform| {
        resolve_opcode(&well_formed(opcode), &platform.features(), false).unwrap().unwrap()
    };

    assert_eq!(resolve(Opcode::Wait, Platform::Skl).op, Op::Wait);
    let wait = resolve(Opcode::Wait, Platform::Tgllp);
    assert_eq!(wait.op, Op::Sync);
    assert_eq!(wait.subfunction, Subfunction::Sync(SyncFc::Bar));

    assert_eq!(resolve(Opcode::Sends, Platform::Skl).op, Op::Sends);
    assert_eq!(resolve(Opcode::Sends, Platform::Tgllp).op, Op::Send);
    assert_eq!(resolve(Opcode::Sendsc, Platform::Tgllp).op, Op::Sendc);

    assert_eq!(resolve(Opcode::PseudoMad, Platform::Skl).op, Op::Mad);
    assert_eq!(resolve(Opcode::PseudoNot, Platform::Skl).op, Op::Not);
    assert_eq!(resolve(Opcode::PseudoFcall, Platform::Skl).op, Op::Call);
    assert_eq!(resolve(Opcode::PseudoFcRet, Platform::Skl).op, Op::Ret);
}

#[test]
fn register_call_becomes_calla_where_encoded() {
    let call = Instruction::new(Opcode::Call, 1)
        .with_dst(DstRegion::grf(10, 0, 1, DataType::UD))
        .with_src(SrcRegion::grf(12, 0, RegionDesc::scalar(), DataType::UD));

    let xehp = resolve_opcode(&call, &Platform::XeHpSdv.features(), false).unwrap().unwrap();
    assert_eq!(xehp.op, Op::Calla);
    let tgl = resolve_opcode(&call, &Platform::Tgllp.features(), false).unwrap().unwrap();
    assert_eq!(tgl.op, Op::Call);
}

#[test]
fn platform_gated_ops() {
    let features = Platform::Skl.features();
    assert!(matches!(
        resolve_opcode(&well_formed(Opcode::SyncNop), &features, false),
        Err(EmitError::UnsupportedOpcode { opcode: "sync_nop", .. })
    ));
    assert!(resolve_opcode(&well_formed(Opcode::Dpas), &Platform::Tgllp.features(), false).is_err());
    assert!(resolve_opcode(&well_formed(Opcode::Dpas), &Platform::XeHpSdv.features(), false).is_ok());
    assert!(resolve_opcode(&well_formed(Opcode::Csel), &Platform::Bdw.features(), false).is_err());
    assert!(resolve_opcode(&well_formed(Opcode::Csel), &Platform::Icllp.features(), false).is_ok());
}

#[test]
fn malformed_function_controls_are_operand_errors() {
    let features = Platform::XeHpSdv.features();
    let math = Instruction::new(Opcode::Math, 8);
    assert!(matches!(
        resolve_opcode(&math, &features, true),
        Err(EmitError::IllegalOperandEncoding { field: "math_fc", .. })
    ));

    let dpas = Instruction::new(Opcode::Dpas, 8).with_dpas(DpasInfo {
        systolic_depth: 3,
        repeat_count: 8,
        src1_precision: Precision::S8,
        src2_precision: Precision::S8,
    });
    assert!(matches!(
        resolve_opcode(&dpas, &features, false),
        Err(EmitError::IllegalOperandEncoding { field: "dpas", .. })
    ));
}

#[test]
fn unsupported_opcode_aborts_kernel() {
    let _ = env_logger::builder().is_test(true).try_init();
    let arena = Bump::new();
    let session = EmitSession::new(&arena);

    let mut kernel = Kernel::new("mulh_kernel");
    let b = kernel.add_block();
    kernel.push(b, Instruction::nop());
    kernel.push(
        b,
        Instruction::new(Opcode::Mulh, 8)
            .with_dst(DstRegion::grf(10, 0, 1, DataType::D))
            .with_src(SrcRegion::grf(2, 0, RegionDesc::contiguous8(), DataType::D))
            .with_src(SrcRegion::grf(4, 0, RegionDesc::contiguous8(), DataType::D)),
    );

    let err = encode_kernel(&session, &mut kernel, Platform::Tgllp, EncoderOptions::default()).unwrap_err();
    assert_eq!(
        err,
        EmitError::UnsupportedOpcode { position: 1, opcode: "mulh", platform: "tgllp" }
    );
}

#[test]
fn encoder_intrinsics_are_dropped() {
    let _ = env_logger::builder().is_test(true).try_init();
    let arena = Bump::new();
    let session = EmitSession::new(&arena);

    let mut intrinsic = Instruction::new(Opcode::Intrinsic, 1);
    intrinsic.intrinsic = Some(LoweringPhase::BinaryEncoding);

    let mut kernel = Kernel::new("intrinsic_kernel");
    let b = kernel.add_block();
    kernel.push(b, intrinsic);
    kernel.push(
        b,
        Instruction::new(Opcode::Mov, 8)
            .with_dst(DstRegion::grf(10, 0, 1, DataType::UD))
            .with_src(Operand::imm(7, DataType::UD)),
    );

    let out = encode_kernel(&session, &mut kernel, Platform::Skl, EncoderOptions::default()).unwrap();
    assert_eq!(out.asm_count, 1);
    assert_eq!(out.len(), 16);
    assert_eq!(kernel.blocks[0].insts.len(), 1);

    // Intrinsics owned by other phases are still rejected.
    let mut foreign = Instruction::new(Opcode::Intrinsic, 1);
    foreign.intrinsic = Some(LoweringPhase::Scheduling);
    let mut kernel = Kernel::new("foreign_intrinsic");
    let b = kernel.add_block();
    kernel.push(b, foreign);
    assert!(matches!(
        encode_kernel(&session, &mut kernel, Platform::Skl, EncoderOptions::default()),
        Err(EmitError::UnsupportedOpcode { opcode: "intrinsic", .. })
    ));
}
