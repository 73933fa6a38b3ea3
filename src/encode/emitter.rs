// This module drives the encoding of one kernel from start to finish. It drops the
// intrinsic pseudo-instructions owned by the encoding phase, walks the mid-IR blocks in
// order, switches the current backend block at every label (creating an initial block when
// the stream does not start with one), hands each instruction to the translator and appends
// the result, continues in the synthesized block after a branch without explicit target,
// pads a payload prologue, and finally lets the serializer encode the program and write
// the results back. Each call builds its own translator and label map; kernels emitted in
// parallel need separate sessions and backends, nothing else is shared.

//! Kernel emission driver.
//!
//! ```text
//! drop encoder intrinsics
//! for each block {
//!     for each instruction {
//!         label        -> resolve block, append it, make it current
//!         instruction  -> translate, append to current block
//!         fallthrough  -> append synthesized block, make it current
//!     }
//! }
//! pad payload prologue, append debugger reservation
//! encode, write PCs back, fill job info
//! ```

use hashbrown::HashSet;
use log::{debug, trace};

use crate::core::error::{EmitError, EmitResult, OperandSlot};
use crate::core::options::EncoderOptions;
use crate::core::platform::{Platform, PlatformFeatures};
use crate::core::session::EmitSession;
use crate::isa::{BlockId, InstHandle, IsaBackend, ReferenceEncoder};
use crate::mir::{Instruction, Kernel, LoweringPhase, Opcode};

use super::serializer::{check_prologue_kinds, EmittedInst, EncodedKernel, Serializer};
use super::translator::Translator;

/// Whether `inst` is an intrinsic the encoder lowers by dropping it.
pub fn is_encoder_intrinsic(inst: &Instruction) -> bool {
    inst.opcode == Opcode::Intrinsic && inst.intrinsic == Some(LoweringPhase::BinaryEncoding)
}

/// Emits kernels for one platform into one session.
pub struct KernelEmitter<'s, 'arena> {
    session: &'s EmitSession<'arena>,
    features: PlatformFeatures,
    options: EncoderOptions,
}

impl<'s, 'arena> KernelEmitter<'s, 'arena> {
    pub fn new(session: &'s EmitSession<'arena>, platform: Platform, options: EncoderOptions) -> Self {
        Self { session, features: platform.features(), options }
    }

    pub fn features(&self) -> &PlatformFeatures {
        &self.features
    }

    /// Emit `kernel` through the in-crate reference backend.
    pub fn emit(&self, kernel: &mut Kernel) -> EmitResult<EncodedKernel<'arena>> {
        let mut backend = ReferenceEncoder::new(self.features.platform);
        self.emit_with(kernel, &mut backend)
    }

    /// Emit `kernel` through `backend`, which must be fresh.
    pub fn emit_with<B: IsaBackend>(
        &self,
        kernel: &mut Kernel,
        backend: &mut B,
    ) -> EmitResult<EncodedKernel<'arena>> {
        check_prologue_kinds(kernel)?;

        let mut dropped = 0;
        for block in &mut kernel.blocks {
            let before = block.insts.len();
            block.insts.retain(|i| !is_encoder_intrinsic(i));
            dropped += before - block.insts.len();
        }
        if dropped > 0 {
            trace!("dropped {dropped} encoder intrinsics from {}", kernel.name);
        }
        debug!(
            "emitting kernel {} for {}: {} blocks, {} instructions",
            kernel.name,
            self.features.platform,
            kernel.blocks.len(),
            kernel.instructions().count()
        );

        let serializer = Serializer::new(self.session, self.features, self.options);
        let mut appended: HashSet<BlockId> = HashSet::new();
        let mut emitted = Vec::new();
        let mut prologue: Option<(BlockId, Vec<InstHandle>)> = None;
        {
            let mut tr = Translator::new(&mut *backend, self.features, self.options);
            let mut current: Option<BlockId> = None;

            for (block_idx, block) in kernel.blocks.iter().enumerate() {
                for inst in &block.insts {
                    if inst.is_label() {
                        let label = inst.label.ok_or_else(|| EmitError::IllegalOperandEncoding {
                            position: inst.position,
                            opcode: inst.opcode.name(),
                            slot: OperandSlot::Inst,
                            field: "label",
                            reason: "label instruction without label id".to_string(),
                        })?;
                        let target = tr.resolve_label(label);
                        tr.backend().append_block(target);
                        appended.insert(target);
                        current = Some(target);
                        continue;
                    }

                    let cur = match current {
                        Some(b) => b,
                        None => {
                            let b = tr.backend().create_block();
                            tr.backend().append_block(b);
                            appended.insert(b);
                            trace!("initial block {} for {}", b.0, kernel.name);
                            current = Some(b);
                            b
                        }
                    };

                    let out = tr.translate(inst)?;
                    tr.backend().append_instruction(cur, out.handle)?;
                    emitted.push(EmittedInst { handle: out.handle, position: inst.position });
                    self.session.record_instruction_translated(out.op.mnemonic());

                    if block_idx == 0 && kernel.prologue.any() {
                        let (pblock, handles) = prologue.get_or_insert_with(|| (cur, Vec::new()));
                        if *pblock == cur {
                            handles.push(out.handle);
                        }
                    }
                    if let Some(ft) = out.fallthrough {
                        tr.backend().append_block(ft);
                        appended.insert(ft);
                        current = Some(ft);
                        self.session.record_fallthrough_block();
                    }
                }
            }
        }

        if let Some((block, handles)) = prologue {
            serializer.pad_prologue_block(backend, block, &handles)?;
        }
        let reservation = if self.options.emit_debuggable_kernel_reservation {
            Some(serializer.append_debug_reservation(backend)?)
        } else {
            None
        };
        let block_count = appended.len() + usize::from(reservation.is_some());
        serializer.serialize(backend, kernel, &emitted, block_count, reservation)
    }
}

/// Encode `kernel` for `platform` with the reference backend.
pub fn encode_kernel<'arena>(
    session: &EmitSession<'arena>,
    kernel: &mut Kernel,
    platform: Platform,
    options: EncoderOptions,
) -> EmitResult<EncodedKernel<'arena>> {
    KernelEmitter::new(session, platform, options).emit(kernel)
}
