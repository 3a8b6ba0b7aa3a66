//! The top-level per-function translator.
//!
//! [`FuncTranslator`] owns every piece of per-function state (the
//! symbolic value stack, the control-frame stack, the instruction
//! builder) and is driven by an external parser calling the
//! [`crate::visit::OpcodeVisitor`] methods implemented on it in
//! `visit/*`. This module hosts initialization, finalization, and the
//! shared helpers those visit methods lean on: resolving operands,
//! copying branch/return values into their target registers, and
//! closing out `block`/`loop`/`if`/`end`.

use crate::builder::InstrEncoder;
use crate::control::ControlStack;
use crate::error::{IndexKind, TranslationError, TranslationErrorInner};
use crate::frame::{StackLayout, VReg};
use crate::instr::{CallLayout, Instruction};
use crate::label::LabelRef;
use crate::module::{EngineConfig, FuncIdx, ModuleContext, ThreadingModel, TypeInterner};
use crate::stack::ValueStack;
use crate::value::{FuncType, ValueType};

/// Translates one function body into an [`crate::instr::InstructionSequence`].
pub struct FuncTranslator<'m> {
    module: &'m dyn ModuleContext,
    interner: &'m mut dyn TypeInterner,
    config: EngineConfig,
    func_idx: FuncIdx,
    func_type: FuncType,
    /// The full local index space: the function's parameters followed by
    /// its declared locals, in Wasm local-index order.
    local_types: Vec<ValueType>,
    layout: StackLayout,
    values: ValueStack,
    control: ControlStack,
    encoder: InstrEncoder,
}

impl<'m> FuncTranslator<'m> {
    /// Begins translating `func_idx`, whose signature is `func_type`. `locals`
    /// is the full local index space (parameters followed by declared
    /// locals, as a driving parser decodes them from the code section's
    /// locals declarations), for a Wasm code section entry of `code_size`
    /// bytes.
    pub fn new(
        module: &'m dyn ModuleContext,
        interner: &'m mut dyn TypeInterner,
        config: EngineConfig,
        func_idx: FuncIdx,
        func_type: FuncType,
        locals: &[ValueType],
        code_size: u32,
    ) -> Result<Self, TranslationError> {
        let layout = StackLayout::new(&func_type, locals.len() as u32, code_size)?;
        let mut encoder = InstrEncoder::new(layout.constant_slot_size(), config.threading_model());
        let mut control = ControlStack::new();
        let end_label = encoder.alloc_label();
        control.push_root(func_type.results().len() as u16, end_label);
        if config.interception_enabled() {
            encoder.emit(Instruction::OnEnter(func_idx));
        }
        let mut values = ValueStack::new();
        for (i, ty) in func_type.params().iter().enumerate() {
            values.push_local(*ty, i as u32);
        }
        Ok(Self {
            module,
            interner,
            config,
            func_idx,
            func_type,
            local_types: locals.to_vec(),
            layout,
            values,
            control,
            encoder,
        })
    }

    /// Resolves a local index to its declared [`ValueType`].
    pub(crate) fn local_type(&self, local_idx: u32) -> Result<ValueType, TranslationError> {
        self.local_types.get(local_idx as usize).copied().ok_or_else(|| {
            TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                kind: IndexKind::Local,
                index: local_idx,
            })
        })
    }

    /// Writes `src` into `local_idx`'s own register, first materializing
    /// every symbolic stack entry that currently aliases that local (they
    /// must keep reading its pre-write value).
    ///
    /// `is_tee` suppresses the relink attempt: `local.tee` must go
    /// through an explicit `Copy` rather than have the producer itself
    /// retargeted, per `local.set`'s relink rule not extending to `tee`.
    pub(crate) fn write_local(&mut self, local_idx: u32, src: VReg, is_tee: bool) {
        self.values.preserve_local_on_stack(local_idx, &self.layout, &mut self.encoder);
        let dst = self.layout.local_reg(local_idx);
        if dst == src {
            return;
        }
        if !is_tee && self.encoder.last_emission_result() == Some(src) && self.encoder.try_relink_result(dst) {
            return;
        }
        self.encoder.emit(Instruction::Copy { dst, src });
    }

    pub fn module(&self) -> &dyn ModuleContext {
        self.module
    }

    pub fn layout(&self) -> &StackLayout {
        &self.layout
    }

    pub fn is_reachable(&self) -> bool {
        self.control.is_reachable()
    }

    pub(crate) fn values_mut(&mut self) -> &mut ValueStack {
        &mut self.values
    }

    pub(crate) fn control_mut(&mut self) -> &mut ControlStack {
        &mut self.control
    }

    pub(crate) fn encoder_mut(&mut self) -> &mut InstrEncoder {
        &mut self.encoder
    }

    pub(crate) fn interner_mut(&mut self) -> &mut dyn TypeInterner {
        self.interner
    }

    /// The home register a value pushed right now would occupy. Used to
    /// pick a producer instruction's result register before the value is
    /// actually pushed, since a `Stack`-sourced entry's home register is
    /// simply `layout.stack_reg(height)` at the position it's pushed to.
    pub(crate) fn next_result_reg(&self) -> VReg {
        self.layout.stack_reg(self.values.height())
    }

    /// Pushes a value already materialized in its
    /// [`FuncTranslator::next_result_reg`] home register.
    pub(crate) fn push_result(&mut self, ty: ValueType) {
        self.values.push_stack(ty);
    }

    /// Resolves the value at logical stack depth `depth` (0 = topmost)
    /// to a usable [`VReg`], materializing it if necessary.
    pub(crate) fn resolve_operand(&mut self, depth: u16) -> Result<VReg, TranslationError> {
        let height = self.values.height();
        let index = height
            .checked_sub(depth + 1)
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::StackUnderflow))?;
        Ok(self.values.resolve(index as usize, &self.layout, &mut self.encoder))
    }

    /// Pops the topmost operand, checking it has type `expected`, and
    /// resolves it to a [`VReg`].
    ///
    /// Tolerant of underflow while unreachable: validated Wasm permits an
    /// unreachable region's operand stack to be polymorphic, so a pop past
    /// the bottom there yields a throwaway register rather than an error
    /// (the surrounding code can never actually execute).
    pub(crate) fn pop_value(&mut self, expected: ValueType) -> Result<VReg, TranslationError> {
        if self.values.height() == 0 && !self.is_reachable() {
            return Ok(self.layout.stack_reg(0));
        }
        let reg = self.resolve_operand(0)?;
        self.values.pop_expect(expected)?;
        Ok(reg)
    }

    /// Like [`FuncTranslator::pop_value`] but for a reference-typed
    /// operand whose exact type (`funcref`/`externref`) isn't pinned down
    /// by the opcode itself.
    pub(crate) fn pop_ref_value(&mut self) -> Result<VReg, TranslationError> {
        if self.values.height() == 0 && !self.is_reachable() {
            return Ok(self.layout.stack_reg(0));
        }
        let reg = self.resolve_operand(0)?;
        self.values.pop_ref()?;
        Ok(reg)
    }

    /// Pops the topmost operand without a type expectation, returning both
    /// its register and its type. Used by opcodes whose operand type is
    /// itself the result type (`drop`, `select`).
    pub(crate) fn pop_any_value(&mut self) -> Result<(VReg, ValueType), TranslationError> {
        if self.values.height() == 0 && !self.is_reachable() {
            return Ok((self.layout.stack_reg(0), ValueType::I32));
        }
        let reg = self.resolve_operand(0)?;
        let ty = self.values.pop()?.value_type();
        Ok((reg, ty))
    }

    /// Pops `count` operands (in push order, i.e. `result[0]` was pushed
    /// first) and resolves each to a [`VReg`], for a call's parameter
    /// list or a multi-value block's copy-on-branch.
    fn pop_and_resolve_n(&mut self, count: u16) -> Result<Vec<VReg>, TranslationError> {
        let mut regs = Vec::with_capacity(count as usize);
        for depth in (0..count).rev() {
            regs.push(self.resolve_operand(depth)?);
        }
        self.values.truncate(self.values.height() - count);
        Ok(regs)
    }

    /// Copies `count` values, currently on top of the operand stack, into
    /// consecutive destination registers starting at `dst_base`. Used by
    /// both `return` and branch-with-values.
    fn copy_operands_to(&mut self, count: u16, dst_base: VReg) -> Result<(), TranslationError> {
        let regs = self.pop_and_resolve_n(count)?;
        for (i, src) in regs.into_iter().enumerate() {
            let dst = VReg::from_i16(dst_base.to_i16() + i as i16);
            if dst != src {
                self.encoder.emit(Instruction::Copy { dst, src });
            }
        }
        Ok(())
    }

    /// Implements `return`: copies the function's return values into the
    /// frame header's result slots and emits `Return`.
    pub(crate) fn translate_return(&mut self) -> Result<(), TranslationError> {
        if !self.is_reachable() {
            return Ok(());
        }
        let num_results = self.func_type.results().len() as u16;
        let dst_base = self.layout.header().return_reg(0);
        self.copy_operands_to(num_results, dst_base)?;
        self.encoder.emit(Instruction::Return);
        self.control.mark_unreachable()?;
        Ok(())
    }

    /// Implements `br`/`br_if`'s value-copying side: copies the branch's
    /// live operands into the target frame's result (or, for a `loop`,
    /// parameter) registers, without yet emitting the branch instruction
    /// itself.
    pub(crate) fn translate_copy_branch_params(&mut self, relative_depth: u32) -> Result<LabelRef, TranslationError> {
        let frame = self.control.frame_at_depth(relative_depth)?;
        let target = frame.branch_target();
        let copy_count = frame.branch_copy_count(self.module)?;
        let dst_base = self.layout.stack_reg(frame.stack_height());
        self.copy_operands_to(copy_count, dst_base)?;
        Ok(target)
    }

    /// Resolves the top `count` operands without popping them, for a
    /// `br_table` whose arms each need the same source values copied to
    /// possibly distinct destinations.
    fn resolve_top_n(&mut self, count: u16) -> Vec<VReg> {
        (0..count)
            .rev()
            .map(|depth| {
                self.resolve_operand(depth)
                    .expect("depth within already-resolved copy_count is in range")
            })
            .collect()
    }

    /// Emits `Copy` instructions placing `regs` (in push order) starting
    /// at `dst_base`, skipping no-op same-register copies.
    fn copy_regs_to(&mut self, regs: &[VReg], dst_base: VReg) {
        for (i, src) in regs.iter().enumerate() {
            let dst = VReg::from_i16(dst_base.to_i16() + i as i16);
            if dst != *src {
                self.encoder.emit(Instruction::Copy { dst, src: *src });
            }
        }
    }

    /// Implements `br_table`'s value-copying side: every arm of a
    /// validated `br_table` carries the same operand count and types, but
    /// distinct target frames may sit at distinct stack heights, so each
    /// arm's destination is computed and copied to independently from a
    /// single, shared resolution of the live operands (resolved once,
    /// popped once, at the end).
    pub(crate) fn translate_br_table_targets(
        &mut self,
        targets: &[u32],
        default: u32,
    ) -> Result<Vec<LabelRef>, TranslationError> {
        let default_frame = self.control.frame_at_depth(default)?;
        let copy_count = default_frame.branch_copy_count(self.module)?;
        let regs = self.resolve_top_n(copy_count);
        let mut labels = Vec::with_capacity(targets.len() + 1);
        for &depth in targets {
            let frame = self.control.frame_at_depth(depth)?;
            let dst_base = self.layout.stack_reg(frame.stack_height());
            self.copy_regs_to(&regs, dst_base);
            labels.push(frame.branch_target());
        }
        let default_frame = self.control.frame_at_depth(default)?;
        let dst_base = self.layout.stack_reg(default_frame.stack_height());
        self.copy_regs_to(&regs, dst_base);
        labels.push(default_frame.branch_target());
        self.values.truncate(self.values.height() - copy_count);
        Ok(labels)
    }

    /// Called at a `block`'s `end`: pops the frame, leaves its results on
    /// the symbolic stack at the frame's original height, and pins the
    /// frame's end label (whether or not it was ever referenced).
    pub(crate) fn translate_end_block(&mut self) -> Result<(), TranslationError> {
        let frame = self.control.pop()?;
        self.encoder.pin_label(frame.end_label())?;
        self.finish_frame(&frame)
    }

    /// Called at a `loop`'s `end`. Identical bookkeeping to a block; the
    /// loop header label was already pinned at entry.
    pub(crate) fn translate_end_loop(&mut self) -> Result<(), TranslationError> {
        self.translate_end_block()
    }

    /// Called at an `if`'s `end` when no `else` arm was taken (or the
    /// `if` had no `else` at all): pins both the (possibly still
    /// unreferenced) else label at the current position and the end
    /// label, then restores the frame's results onto the stack.
    pub(crate) fn translate_end_if(&mut self) -> Result<(), TranslationError> {
        let mut frame = self.control.pop()?;
        if let Some(else_label) = frame.take_else_label() {
            self.encoder.pin_label(else_label)?;
        }
        self.encoder.pin_label(frame.end_label())?;
        self.finish_frame(&frame)
    }

    /// Called at `else`: closes the `then` arm (branching to the `end`
    /// label if it fell through reachably), pins the `else` label, and
    /// resets the frame's value stack/reachability to the `if`'s entry
    /// state so the `else` arm starts from the same inputs.
    pub(crate) fn translate_else(&mut self) -> Result<(), TranslationError> {
        let frame = self.control.top()?.clone();
        if self.is_reachable() {
            let copy_count = frame.block_type().len_results(self.module)?;
            let dst_base = self.layout.stack_reg(frame.stack_height());
            self.copy_operands_to(copy_count, dst_base)?;
            self.encoder.emit_branch(frame.end_label());
        }
        let else_label = self
            .control
            .top_mut()?
            .take_else_label()
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::ControlMismatch("else without matching if")))?;
        self.encoder.pin_label(else_label)?;
        self.values.truncate(frame.stack_height());
        let param_types = frame.block_type().func_type(self.module)?.params().to_vec();
        for ty in param_types {
            self.values.push_stack(ty);
        }
        self.control.top_mut()?.reset_reachability();
        Ok(())
    }

    /// Restores the symbolic stack to the frame's post-execution shape:
    /// materializes the frame's live results into their landing registers
    /// (the same slots they already occupy positionally — a body that
    /// falls off its own `end` needs this exactly like a `br` needs
    /// [`FuncTranslator::copy_operands_to`]), then truncates back to the
    /// frame's entry height and pushes its result types as fresh,
    /// already-materialized stack values.
    fn finish_frame(&mut self, frame: &crate::control::ControlFrame) -> Result<(), TranslationError> {
        let num_results = if frame.is_root() {
            self.func_type.results().len() as u16
        } else {
            frame.block_type().len_results(self.module)?
        };
        // The enclosing frame's own reachability is untouched by what
        // happened inside `frame`: it was saved at push time and governs
        // the code following `end` regardless of whether `frame`'s body
        // fell off its own end reachably.
        //
        // A body that falls off its own `end` needs the same landing copy
        // a `br` out of it would get: the live results may be local
        // aliases or unmaterialized constants, not yet sitting in the
        // stack registers the now-truncated frame's results will claim.
        if frame.reachable() {
            let dst_base = self.layout.stack_reg(frame.stack_height());
            self.copy_operands_to(num_results, dst_base)?;
        } else {
            self.values.truncate(frame.stack_height());
        }
        let result_types: Vec<ValueType> = if frame.is_root() {
            self.func_type.results().to_vec()
        } else {
            frame.block_type().func_type(self.module)?.results().to_vec()
        };
        debug_assert_eq!(result_types.len() as u16, num_results);
        for ty in result_types {
            self.values.push_stack(ty);
        }
        Ok(())
    }

    /// Builds a [`CallLayout`] for a call with `num_params` parameters
    /// already resolved from the stack and `num_results` results, placing
    /// the callee's frame header at the correct offset above the current
    /// stack height.
    pub(crate) fn build_call_layout(
        &mut self,
        callee_type: &FuncType,
    ) -> Result<(CallLayout, Vec<VReg>), TranslationError> {
        let num_params = callee_type.params().len() as u16;
        let num_results = callee_type.results().len() as u16;
        let param_regs = self.pop_and_resolve_n(num_params)?;
        let height = self.values.height();
        let params_base = self.layout.stack_reg(height);
        for (i, src) in param_regs.iter().enumerate() {
            let dst = VReg::from_i16(params_base.to_i16() + i as i16);
            if dst != *src {
                self.encoder.emit(Instruction::Copy { dst, src: *src });
            }
        }
        let callee_header = crate::frame::FrameHeaderLayout::new(callee_type)?;
        let sp_addend = height + callee_header.size();
        let results_base = params_base;
        for ty in callee_type.results() {
            self.values.push_stack(*ty);
        }
        Ok((
            CallLayout { params_base, num_params, results_base, num_results, sp_addend },
            param_regs,
        ))
    }

    /// Finalizes the function body: emits the defensive trailing `return`
    /// (`OnExit`+`Return`) used whenever the root frame itself is reached
    /// (rather than an explicit `return`), pins the root's end label, and
    /// packages everything into an [`crate::instr::InstructionSequence`].
    pub fn finish(mut self) -> Result<crate::instr::InstructionSequence, TranslationError> {
        if self.control.len() != 1 {
            return Err(TranslationError::new(TranslationErrorInner::MissingEnd {
                open_frames: self.control.len().saturating_sub(1),
            }));
        }
        let root = self.control.pop()?;
        if self.is_root_reachable(&root) {
            let num_results = self.func_type.results().len() as u16;
            let dst_base = self.layout.header().return_reg(0);
            self.copy_operands_to(num_results, dst_base)?;
        }
        if self.config.interception_enabled() {
            self.encoder.emit(Instruction::OnExit(self.func_idx));
        }
        self.encoder.emit(Instruction::Return);
        self.encoder.pin_label(root.end_label())?;
        self.encoder.finish(self.values.max_height() as usize)
    }

    fn is_root_reachable(&self, root: &crate::control::ControlFrame) -> bool {
        root.reachable()
    }
}
