//! The instruction-sequence builder.
//!
//! Combines the [`Arena`], the [`LabelRegistry`], and the [`ConstantPool`]
//! into the single object the translator emits code through. Also hosts
//! the result-relink peephole: the last emitted producer instruction can
//! have its result register rewritten in place, eliding a `copy` that
//! would otherwise immediately follow it.

use crate::arena::Arena;
use crate::error::TranslationError;
use crate::frame::VReg;
use crate::instr::{BranchOffset, Instruction, InstructionSequence};
use crate::label::{LabelRef, LabelRegistry};
use crate::module::ThreadingModel;
use crate::pool::ConstantPool;

/// The last-emitted instruction, kept around only long enough to decide
/// whether a result-relink applies.
#[derive(Debug, Clone)]
struct LastEmission {
    head_pos: usize,
    instr: Instruction,
}

/// Builds one function's [`InstructionSequence`].
pub struct InstrEncoder {
    arena: Arena,
    labels: LabelRegistry,
    pool: ConstantPool,
    model: ThreadingModel,
    last_emission: Option<LastEmission>,
}

impl InstrEncoder {
    pub fn new(pool_capacity: u16, model: ThreadingModel) -> Self {
        Self {
            arena: Arena::new(),
            labels: LabelRegistry::new(),
            pool: ConstantPool::new(pool_capacity),
            model,
            last_emission: None,
        }
    }

    /// The program counter (instruction-word index) the next emission
    /// will occupy.
    pub fn position(&self) -> usize {
        self.arena.position()
    }

    /// Shared access to the constant pool, e.g. for `visitConst` to
    /// attempt interning a literal before falling back to an inline
    /// `const32`/`const64`.
    pub fn pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    /// Emits `instr` verbatim, returning its head-word position.
    ///
    /// If `instr` is a simple producer (see
    /// [`Instruction::producer_result`]), it becomes eligible for the
    /// next [`InstrEncoder::try_relink_result`]; otherwise any pending
    /// relink candidate is cleared.
    pub fn emit(&mut self, instr: Instruction) -> usize {
        let mut words = Vec::new();
        instr.encode(&mut words, self.model);
        let pos = self.arena.push_words(&words);
        self.last_emission = instr
            .producer_result()
            .is_some()
            .then(|| LastEmission { head_pos: pos, instr });
        pos
    }

    /// Emits an unconditional branch to `label`, resolving the offset
    /// immediately if `label` is already pinned.
    pub fn emit_branch(&mut self, label: LabelRef) -> usize {
        let head_pos = self.emit(Instruction::Branch(BranchOffset(0)));
        let word_pos = head_pos + 1;
        self.resolve_branch(label, word_pos, head_pos);
        head_pos
    }

    /// Emits a conditional branch, taken when `condition` is non-zero.
    pub fn emit_branch_if(&mut self, condition: VReg, label: LabelRef) -> usize {
        let head_pos = self.emit(Instruction::BranchIf { condition, offset: BranchOffset(0) });
        let word_pos = head_pos + 2;
        self.resolve_branch(label, word_pos, head_pos);
        head_pos
    }

    /// Emits a conditional branch, taken when `condition` is zero.
    pub fn emit_branch_if_not(&mut self, condition: VReg, label: LabelRef) -> usize {
        let head_pos = self.emit(Instruction::BranchIfNot { condition, offset: BranchOffset(0) });
        let word_pos = head_pos + 2;
        self.resolve_branch(label, word_pos, head_pos);
        head_pos
    }

    /// `source_pc` is fixed at `head_pos + 1` — the slot immediately
    /// after the head — regardless of which immediate word the offset
    /// itself occupies, so branch offsets stay idempotent under
    /// re-parsing the emitted word stream.
    fn resolve_branch(&mut self, label: LabelRef, word_pos: usize, head_pos: usize) {
        let source_pc = (head_pos + 1) as u32;
        if let Some(offset) = self.labels.use_as_branch_target(label, word_pos, source_pc) {
            self.arena.patch_word(word_pos, offset as u32 as u64);
        }
    }

    /// Emits a `br_table` dispatching on `index` to one of `targets`,
    /// pre-allocating its entry buffer and resolving already-pinned
    /// targets immediately.
    pub fn emit_br_table(&mut self, index: VReg, targets: &[LabelRef]) -> usize {
        let table = self.arena.alloc_br_table(targets.len());
        let head_pos = self.emit(Instruction::BranchTable { index, table });
        for (slot, label) in targets.iter().enumerate() {
            if let Some(pc) = self.labels.use_as_br_table_target(*label, table, slot) {
                self.arena.fill_br_table_entry(table, slot, pc);
            }
        }
        head_pos
    }

    /// Allocates a fresh, unpinned label.
    pub fn alloc_label(&mut self) -> LabelRef {
        self.labels.alloc_unpinned()
    }

    /// Allocates a label pinned at the current position, e.g. for a
    /// `loop` header that branches target the moment the loop begins.
    pub fn alloc_label_here(&mut self) -> LabelRef {
        self.labels.alloc_pinned(self.arena.position() as u32)
    }

    /// Pins `label` at the current position, draining and applying every
    /// pending patch. Also resets the relink peephole: code reachable
    /// only via a branch must never have its producer silently rewritten
    /// by something the branch skipped past.
    pub fn pin_label(&mut self, label: LabelRef) -> Result<(), TranslationError> {
        let pc = self.arena.position() as u32;
        self.labels.pin(label, pc, &mut self.arena)?;
        self.reset_last_emission();
        Ok(())
    }

    /// The result register the pending relink candidate currently writes
    /// to, if any — callers compare this against the value they're about
    /// to copy from to confirm the copy's source really is that
    /// producer's own result before calling
    /// [`InstrEncoder::try_relink_result`] (relinking on a mismatch would
    /// silently rewrite an unrelated earlier instruction).
    pub fn last_emission_result(&self) -> Option<VReg> {
        self.last_emission.as_ref().map(|l| l.instr.producer_result().expect("producer-only by construction"))
    }

    /// Attempts to rewrite the last emitted producer instruction's result
    /// register to `new_result`, eliding an immediately-following `copy`.
    /// Returns `false` (and emits nothing) if there is no eligible
    /// producer, e.g. because a label was pinned or a non-producer
    /// instruction was emitted since.
    pub fn try_relink_result(&mut self, new_result: VReg) -> bool {
        let Some(last) = self.last_emission.as_mut() else {
            return false;
        };
        last.instr.set_result(new_result);
        let mut words = Vec::new();
        last.instr.encode(&mut words, self.model);
        for (i, word) in words.into_iter().enumerate() {
            self.arena.patch_word(last.head_pos + i, word);
        }
        true
    }

    /// Invalidates the relink peephole without emitting anything. Call
    /// this on any event a relink must not cross: a branch, a pinned
    /// label, or any other non-producer emission already clears it
    /// automatically via [`InstrEncoder::emit`].
    pub fn reset_last_emission(&mut self) {
        self.last_emission = None;
    }

    /// Finalizes the function body into an [`InstructionSequence`].
    pub fn finish(self, max_stack_height: usize) -> Result<InstructionSequence, TranslationError> {
        self.labels.finish()?;
        let (instructions, br_tables) = self.arena.finish();
        let constants = self.pool.into_words();
        Ok(InstructionSequence { instructions, constants, br_tables, max_stack_height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{BinaryOp, Instruction};

    fn vreg(i: i16) -> VReg {
        VReg::from_i16(i)
    }

    #[test]
    fn relink_rewrites_last_producer_result() {
        let mut enc = InstrEncoder::new(4, ThreadingModel::Direct);
        enc.emit(Instruction::Binary {
            op: BinaryOp::I32Add,
            result: vreg(0),
            lhs: vreg(1),
            rhs: vreg(2),
        });
        assert!(enc.try_relink_result(vreg(5)));
        let seq = enc.finish(8).unwrap();
        let (_, decoded) = Instruction::decode(&seq.instructions, 0, ThreadingModel::Direct);
        match decoded {
            Instruction::Binary { result, .. } => assert_eq!(result, vreg(5)),
            _ => panic!("expected Binary"),
        }
    }

    #[test]
    fn pin_label_clears_relink_candidate() {
        let mut enc = InstrEncoder::new(4, ThreadingModel::Direct);
        enc.emit(Instruction::Binary {
            op: BinaryOp::I32Add,
            result: vreg(0),
            lhs: vreg(1),
            rhs: vreg(2),
        });
        let label = enc.alloc_label();
        enc.pin_label(label).unwrap();
        assert!(!enc.try_relink_result(vreg(9)));
    }

    #[test]
    fn branch_to_unpinned_label_patches_on_pin() {
        let mut enc = InstrEncoder::new(4, ThreadingModel::Direct);
        let label = enc.alloc_label();
        let head = enc.emit_branch(label);
        enc.emit(Instruction::Return);
        enc.pin_label(label).unwrap();
        let seq = enc.finish(1).unwrap();
        let (_, decoded) = Instruction::decode(&seq.instructions, head, ThreadingModel::Direct);
        match decoded {
            Instruction::Branch(BranchOffset(o)) => assert_eq!(o, 2),
            _ => panic!("expected Branch"),
        }
    }

    #[test]
    fn branch_to_already_pinned_label_resolves_immediately() {
        let mut enc = InstrEncoder::new(4, ThreadingModel::Direct);
        let header = enc.alloc_label_here();
        enc.emit(Instruction::Return);
        let head = enc.emit_branch(header);
        let seq = enc.finish(1).unwrap();
        let (_, decoded) = Instruction::decode(&seq.instructions, head, ThreadingModel::Direct);
        match decoded {
            Instruction::Branch(BranchOffset(o)) => assert_eq!(o, -2),
            _ => panic!("expected Branch"),
        }
    }

    #[test]
    fn finish_errors_on_dangling_label() {
        let mut enc = InstrEncoder::new(4, ThreadingModel::Direct);
        let label = enc.alloc_label();
        enc.emit_branch(label);
        assert!(enc.finish(1).is_err());
    }
}
