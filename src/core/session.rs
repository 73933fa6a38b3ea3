// This module provides arena-based emission session management using the bumpalo crate.
// EmitSession is the hub that owns the arena reference and the per-session statistics: every
// binary produced by the serializer is copied into the arena so that EncodedKernel results
// can hand out plain byte slices tied to the session lifetime, no matter which backend
// produced them. EmitStats tracks kernels encoded, instructions translated per target op,
// blocks emitted (and how many were synthesized fallthrough blocks), padding nops inserted
// for payload prologues, compacted instructions and total binary size. A session is not
// shared between threads: independent kernels encoded in parallel each use their own.

//! Arena-based emission session.

use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;

/// Arena-based emission session.
///
/// All binaries produced while the session is alive are allocated in its
/// arena and share the session lifetime.
pub struct EmitSession<'arena> {
    arena: &'arena Bump,
    stats: RefCell<EmitStats>,
}

impl<'arena> EmitSession<'arena> {
    /// Create a new session backed by the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(EmitStats::default()),
        }
    }

    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Copy an encoded binary into the session arena.
    pub fn alloc_binary(&self, bytes: &[u8]) -> &'arena [u8] {
        self.arena.alloc_slice_copy(bytes)
    }

    pub fn record_instruction_translated(&self, op: &'static str) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_translated += 1;
        *stats.op_counts.entry(op).or_insert(0) += 1;
    }

    pub fn record_fallthrough_block(&self) {
        self.stats.borrow_mut().fallthrough_blocks += 1;
    }

    pub fn record_padding_nops(&self, count: usize) {
        self.stats.borrow_mut().padding_nops += count;
    }

    /// Record a finished kernel.
    pub fn record_kernel_encoded(&self, name: &str, blocks: usize, compacted: usize, bytes: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.kernels_encoded += 1;
        stats.blocks_emitted += blocks;
        stats.compacted_instructions += compacted;
        stats.total_binary_size += bytes;
        if stats.largest_kernel_size < bytes {
            stats.largest_kernel_size = bytes;
            stats.largest_kernel_name = name.to_string();
        }
    }

    pub fn stats(&self) -> EmitStats {
        self.stats.borrow().clone()
    }
}

/// Emission statistics.
#[derive(Debug, Default, Clone)]
pub struct EmitStats {
    pub kernels_encoded: usize,
    pub instructions_translated: usize,
    /// Translated instructions per target op mnemonic.
    pub op_counts: HashMap<&'static str, usize>,
    pub blocks_emitted: usize,
    pub fallthrough_blocks: usize,
    pub padding_nops: usize,
    pub compacted_instructions: usize,
    /// Total binary size (bytes).
    pub total_binary_size: usize,
    pub largest_kernel_size: usize,
    pub largest_kernel_name: String,
}

impl fmt::Display for EmitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Emission Session Statistics:")?;
        writeln!(f, "  Kernels encoded: {}", self.kernels_encoded)?;
        writeln!(f, "  Instructions translated: {}", self.instructions_translated)?;
        writeln!(f, "  Blocks emitted: {}", self.blocks_emitted)?;
        writeln!(f, "  Fallthrough blocks: {}", self.fallthrough_blocks)?;
        writeln!(f, "  Padding nops: {}", self.padding_nops)?;
        writeln!(f, "  Compacted instructions: {}", self.compacted_instructions)?;
        writeln!(f, "  Total binary size: {} bytes", self.total_binary_size)?;

        if !self.largest_kernel_name.is_empty() {
            writeln!(
                f,
                "  Largest kernel: {} ({} bytes)",
                self.largest_kernel_name, self.largest_kernel_size
            )?;
        }

        if !self.op_counts.is_empty() {
            writeln!(f, "  Op breakdown:")?;
            let mut sorted: Vec<_> = self.op_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (op, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {op}: {count}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let arena = Bump::new();
        let session = EmitSession::new(&arena);

        let stats = session.stats();
        assert_eq!(stats.kernels_encoded, 0);
        assert_eq!(stats.instructions_translated, 0);
    }

    #[test]
    fn test_binary_lives_in_arena() {
        let arena = Bump::new();
        let session = EmitSession::new(&arena);

        let bin = session.alloc_binary(&[1, 2, 3, 4]);
        assert_eq!(bin, &[1, 2, 3, 4]);
        assert!(arena.allocated_bytes() >= 4);
    }

    #[test]
    fn test_statistics_display() {
        let arena = Bump::new();
        let session = EmitSession::new(&arena);

        session.record_instruction_translated("mov");
        session.record_instruction_translated("send");
        session.record_instruction_translated("mov");
        session.record_padding_nops(2);
        session.record_kernel_encoded("blur", 3, 1, 64);

        let stats = session.stats();
        assert_eq!(stats.op_counts["mov"], 2);

        let output = format!("{stats}");
        assert!(output.contains("Kernels encoded: 1"));
        assert!(output.contains("Instructions translated: 3"));
        assert!(output.contains("blur (64 bytes)"));
    }
}
