// This module finishes one kernel after translation. It pads a payload prologue block to a
// multiple of four instructions with nops and marks the whole block non-compactable so the
// runtime loader can skip it at a fixed 64-byte granularity, optionally appends the
// patchable debugger reservation, runs the single backend encode pass, writes the program
// counter of every translated instruction back onto its mid-IR instruction, collects the
// prologue skip offsets into the job-info record and copies the binary into the session
// arena. A backend failure aborts the kernel; nothing is retried.

//! Serialization of a translated kernel.

use hashbrown::HashMap;
use log::{debug, warn};

use crate::core::error::{EmitError, EmitResult, OperandSlot};
use crate::core::options::EncoderOptions;
use crate::core::platform::PlatformFeatures;
use crate::core::session::EmitSession;
use crate::isa::{BackendEncodeOptions, BackendError, BlockId, InstHandle, InstOptSet, IsaBackend};
use crate::mir::{Kernel, SkipPoint};

/// Instruction count granularity of a payload prologue block.
pub const PROLOGUE_ALIGNMENT: usize = 4;

/// Number of non-compactable instructions reserved for a debugger.
pub const DEBUG_RESERVATION_SLOTS: usize = 8;

/// Backend instruction created for a mid-IR instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmittedInst {
    pub handle: InstHandle,
    pub position: u32,
}

/// Offsets the runtime loader and debugger need from an encoded kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitInfo {
    pub offset_to_skip_per_thread_data_load: Option<u32>,
    pub offset_to_skip_cross_thread_data_load: Option<u32>,
    pub offset_to_skip_set_ffid_gp: Option<u32>,
    pub offset_to_skip_set_ffid_gp1: Option<u32>,
    /// Start of the debugger reservation.
    pub debug_reservation_offset: Option<u32>,
    pub binary_size: usize,
    pub compacted_instructions: usize,
}

/// Encoded kernel owned by the session arena.
#[derive(Debug, Clone)]
pub struct EncodedKernel<'arena> {
    pub name: String,
    pub binary: &'arena [u8],
    /// Instructions translated from the mid-IR.
    pub asm_count: usize,
    pub block_count: usize,
    pub jit_info: JitInfo,
}

impl<'arena> EncodedKernel<'arena> {
    pub fn len(&self) -> usize {
        self.binary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binary.is_empty()
    }
}

/// A kernel cannot carry both an FFID prolog and payload prologues.
pub fn check_prologue_kinds(kernel: &Kernel) -> EmitResult<()> {
    let p = &kernel.prologue;
    if p.compute_ffid && (p.per_thread_payload || p.cross_thread_payload) {
        let position = kernel.instructions().next().map(|i| i.position).unwrap_or(0);
        return Err(EmitError::IllegalOperandEncoding {
            position,
            opcode: "prologue",
            slot: OperandSlot::Inst,
            field: "prologue",
            reason: format!("kernel {} mixes an FFID prolog with payload prologues", kernel.name),
        });
    }
    Ok(())
}

pub struct Serializer<'s, 'arena> {
    session: &'s EmitSession<'arena>,
    features: PlatformFeatures,
    options: EncoderOptions,
}

impl<'s, 'arena> Serializer<'s, 'arena> {
    pub fn new(session: &'s EmitSession<'arena>, features: PlatformFeatures, options: EncoderOptions) -> Self {
        Self { session, features, options }
    }

    /// Pad the prologue block holding `insts` and make every instruction in it
    /// non-compactable. Returns the number of nops added.
    pub fn pad_prologue_block<B: IsaBackend>(
        &self,
        backend: &mut B,
        block: BlockId,
        insts: &[InstHandle],
    ) -> EmitResult<usize> {
        let mut last_id = 0;
        for h in insts {
            let inst = backend.instruction_mut(*h).ok_or(BackendError::UnknownInstruction(h.0))?;
            inst.add_inst_opts(InstOptSet::NO_COMPACT);
            last_id = inst.id;
        }

        let rem = insts.len() % PROLOGUE_ALIGNMENT;
        let padding = if rem == 0 { 0 } else { PROLOGUE_ALIGNMENT - rem };
        if padding > 0 {
            warn!(
                "padding prologue block of {} instructions with {} nops",
                insts.len(),
                padding
            );
        }
        for _ in 0..padding {
            let nop = backend.create_nop();
            if let Some(inst) = backend.instruction_mut(nop) {
                inst.add_inst_opts(InstOptSet::NO_COMPACT);
                inst.set_id(last_id);
            }
            backend.append_instruction(block, nop)?;
        }
        self.session.record_padding_nops(padding);
        Ok(padding)
    }

    /// Append the trailing debugger reservation block; returns its first instruction.
    pub fn append_debug_reservation<B: IsaBackend>(&self, backend: &mut B) -> EmitResult<InstHandle> {
        let block = backend.create_block();
        backend.append_block(block);
        let mut first = None;
        for _ in 0..DEBUG_RESERVATION_SLOTS {
            let h = backend.create_illegal();
            if let Some(inst) = backend.instruction_mut(h) {
                inst.add_inst_opts(InstOptSet::NO_COMPACT);
                inst.set_id(u32::MAX);
            }
            backend.append_instruction(block, h)?;
            first.get_or_insert(h);
        }
        first.ok_or_else(|| EmitError::BackendEncodeFailure {
            reason: "empty debugger reservation".to_string(),
        })
    }

    /// Encode everything appended to `backend` and write the results back.
    pub fn serialize<B: IsaBackend>(
        &self,
        backend: &mut B,
        kernel: &mut Kernel,
        emitted: &[EmittedInst],
        block_count: usize,
        reservation: Option<InstHandle>,
    ) -> EmitResult<EncodedKernel<'arena>> {
        let encode_options = BackendEncodeOptions {
            auto_compact: self.options.auto_compact,
            swsb_mode: self.features.swsb_mode,
            auto_deps: self.options.enable_scoreboard_auto_insertion,
        };
        let encoded = backend.encode(&encode_options)?;

        let handles: HashMap<u32, InstHandle> = emitted.iter().map(|e| (e.position, e.handle)).collect();
        let mut jit_info = JitInfo {
            binary_size: encoded.len(),
            compacted_instructions: encoded.compacted,
            debug_reservation_offset: reservation.and_then(|h| encoded.pc(h)),
            ..JitInfo::default()
        };
        for inst in kernel.blocks.iter_mut().flat_map(|b| b.insts.iter_mut()) {
            let Some(handle) = handles.get(&inst.position) else {
                continue;
            };
            inst.gen_offset = encoded.pc(*handle);
            let slot = match inst.skip_point {
                Some(SkipPoint::PerThreadPayload) => &mut jit_info.offset_to_skip_per_thread_data_load,
                Some(SkipPoint::CrossThreadPayload) => &mut jit_info.offset_to_skip_cross_thread_data_load,
                Some(SkipPoint::ComputeFfidGp) => &mut jit_info.offset_to_skip_set_ffid_gp,
                Some(SkipPoint::ComputeFfidGp1) => &mut jit_info.offset_to_skip_set_ffid_gp1,
                None => continue,
            };
            *slot = inst.gen_offset;
        }

        let binary = self.session.alloc_binary(&encoded.bytes);
        self.session.record_kernel_encoded(&kernel.name, block_count, encoded.compacted, binary.len());
        debug!(
            "kernel {}: {} instructions, {} blocks, {} bytes ({} compacted) on {}",
            kernel.name,
            emitted.len(),
            block_count,
            binary.len(),
            encoded.compacted,
            self.features.platform
        );
        Ok(EncodedKernel {
            name: kernel.name.clone(),
            binary,
            asm_count: emitted.len(),
            block_count,
            jit_info,
        })
    }
}
