//! Control-flow opcodes: `block`/`loop`/`if`/`else`/`end`, `br`/`br_if`/
//! `br_table`, `return`, and the two call forms.
//!
//! Most of the actual bookkeeping lives on [`FuncTranslator`] itself
//! (`translate_end_block`, `translate_else`, `build_call_layout`, ...);
//! these methods are thin entry points that additionally decide whether
//! to emit the branch/call instruction itself, which `translate_*`
//! deliberately leaves to the caller.

use crate::instr::Instruction;
use crate::module::{FuncIdx, FuncTypeIdx, ModuleContext, ResolvedCallee, TableIdx};
use crate::translator::FuncTranslator;
use crate::value::{BlockType, ValueType};
use crate::visit::VisitResult;

impl<'m> FuncTranslator<'m> {
    pub(crate) fn do_unreachable(&mut self) -> VisitResult {
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::Return);
            self.control_mut().mark_unreachable()?;
        }
        Ok(())
    }

    pub(crate) fn do_nop(&mut self) -> VisitResult {
        Ok(())
    }

    pub(crate) fn do_block(&mut self, block_type: BlockType) -> VisitResult {
        let num_params = block_type.len_params(self.module())?;
        // In unreachable code the operand stack is polymorphic and may be
        // shorter than `num_params` (e.g. `unreachable` followed by a
        // multi-value `block (param ...)`); `stack_height` is then
        // meaningless bookkeeping rather than a real invariant to uphold.
        let stack_height = self.values_mut().height().saturating_sub(num_params);
        let end_label = self.encoder_mut().alloc_label();
        self.control_mut().push_block(block_type, stack_height, end_label);
        Ok(())
    }

    pub(crate) fn do_loop(&mut self, block_type: BlockType) -> VisitResult {
        let num_params = block_type.len_params(self.module())?;
        let stack_height = self.values_mut().height().saturating_sub(num_params);
        // Values the loop body might read on a back-edge must already be
        // materialized in their fixed stack slots: a `local.get` alias
        // taken before the loop is no longer valid once the loop has
        // mutated that local on a prior iteration.
        self.values_mut().preserve_all_locals_on_stack(self.layout(), self.encoder_mut());
        let header_label = self.encoder_mut().alloc_label_here();
        let end_label = self.encoder_mut().alloc_label();
        self.control_mut().push_loop(block_type, stack_height, header_label, end_label);
        Ok(())
    }

    pub(crate) fn do_if(&mut self, block_type: BlockType) -> VisitResult {
        let condition = self.pop_value(ValueType::I32)?;
        let num_params = block_type.len_params(self.module())?;
        let stack_height = self.values_mut().height().saturating_sub(num_params);
        let else_label = self.encoder_mut().alloc_label();
        let end_label = self.encoder_mut().alloc_label();
        if self.is_reachable() {
            self.encoder_mut().emit_branch_if_not(condition, else_label);
        }
        self.control_mut().push_if(block_type, stack_height, else_label, end_label);
        Ok(())
    }

    pub(crate) fn do_else(&mut self) -> VisitResult {
        self.translate_else()
    }

    pub(crate) fn do_end(&mut self) -> VisitResult {
        let top = self.control_mut().top()?;
        if matches!(top.kind(), crate::control::ControlFrameKind::If { .. }) {
            self.translate_end_if()
        } else if top.is_loop() {
            self.translate_end_loop()
        } else {
            self.translate_end_block()
        }
    }

    pub(crate) fn do_br(&mut self, relative_depth: u32) -> VisitResult {
        if !self.is_reachable() {
            return Ok(());
        }
        let target = self.translate_copy_branch_params(relative_depth)?;
        self.encoder_mut().emit_branch(target);
        self.control_mut().mark_unreachable()?;
        Ok(())
    }

    pub(crate) fn do_br_if(&mut self, relative_depth: u32) -> VisitResult {
        if !self.is_reachable() {
            return Ok(());
        }
        let condition = self.pop_value(ValueType::I32)?;
        let target = self.translate_copy_branch_params(relative_depth)?;
        self.encoder_mut().emit_branch_if(condition, target);
        Ok(())
    }

    pub(crate) fn do_br_table(&mut self, targets: &[u32], default: u32) -> VisitResult {
        if !self.is_reachable() {
            return Ok(());
        }
        let index = self.pop_value(ValueType::I32)?;
        let labels = self.translate_br_table_targets(targets, default)?;
        self.encoder_mut().emit_br_table(index, &labels);
        self.control_mut().mark_unreachable()?;
        Ok(())
    }

    pub(crate) fn do_return(&mut self) -> VisitResult {
        self.translate_return()
    }

    pub(crate) fn do_call(&mut self, func_idx: FuncIdx) -> VisitResult {
        if !self.is_reachable() {
            return Ok(());
        }
        let callee_type = self.module().type_of_func(func_idx)?;
        let (layout, _params) = self.build_call_layout(&callee_type)?;
        let resolved = self.module().resolve_callee(func_idx)?;
        let instr = match resolved {
            Some(ResolvedCallee::Internal(_)) => Instruction::CompilingCall { func: func_idx, layout },
            _ => Instruction::Call { func: func_idx, layout },
        };
        self.encoder_mut().emit(instr);
        Ok(())
    }

    pub(crate) fn do_call_indirect(&mut self, type_idx: FuncTypeIdx, table_idx: TableIdx) -> VisitResult {
        if !self.is_reachable() {
            return Ok(());
        }
        let address = self.pop_value(ValueType::I32)?;
        let callee_type = self.module().resolve_type(type_idx)?;
        let (layout, _params) = self.build_call_layout(&callee_type)?;
        let ty = self.interner_mut().intern(callee_type);
        self.encoder_mut().emit(Instruction::CallIndirect { table: table_idx, ty, address, layout });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{EngineConfig, SimpleModule};
    use crate::value::FuncType;

    fn translator(module: &SimpleModule, interner: &mut crate::module::DedupFuncTypeInterner) -> FuncTranslator<'_> {
        let func_type = FuncType::new([], []);
        FuncTranslator::new(module, interner, EngineConfig::default(), FuncIdx::from_u32(0), func_type, &[], 0).unwrap()
    }

    #[test]
    fn unreachable_emits_return_and_marks_unreachable() {
        let module = SimpleModule::new();
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.do_unreachable().unwrap();
        assert!(!t.is_reachable());
        let seq = t.finish().unwrap();
        assert_eq!(seq.instructions.len(), 1);
    }

    #[test]
    fn block_then_end_restores_result_types() {
        let mut module = SimpleModule::new();
        let ty = module.push_type(FuncType::new([], [ValueType::I32]));
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.do_block(BlockType::FuncType(ty)).unwrap();
        // A real driver would translate the block body here, e.g. a
        // `i32.const` producing the block's single result.
        t.values_mut().push_const(crate::value::ConstValue::I32(1));
        t.do_end().unwrap();
        assert_eq!(t.values_mut().height(), 1);
    }

    #[test]
    fn if_without_else_branches_to_else_label_which_equals_end() {
        let module = SimpleModule::new();
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.values_mut().push_const(crate::value::ConstValue::I32(1));
        t.do_if(BlockType::Empty).unwrap();
        t.do_end().unwrap();
        let seq = t.finish().unwrap();
        assert!(seq.instructions.len() >= 2);
    }

    #[test]
    fn br_out_of_block_marks_unreachable() {
        let mut module = SimpleModule::new();
        let ty = module.push_type(FuncType::new([], []));
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.do_block(BlockType::FuncType(ty)).unwrap();
        t.do_br(0).unwrap();
        assert!(!t.is_reachable());
    }

    #[test]
    fn block_with_params_in_unreachable_code_does_not_underflow() {
        // `unreachable` followed by a multi-value `block (param i32)` with
        // nothing actually on the stack: the operand stack is polymorphic
        // here, so `num_params` may exceed the real height.
        let mut module = SimpleModule::new();
        let ty = module.push_type(FuncType::new([ValueType::I32], [ValueType::I32]));
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.do_unreachable().unwrap();
        t.do_block(BlockType::FuncType(ty)).unwrap();
        t.do_end().unwrap();
        assert!(t.finish().is_ok());
    }

    #[test]
    fn call_resolves_internal_callee_to_compiling_call() {
        let mut module = SimpleModule::new();
        let ty = module.push_type(FuncType::new([ValueType::I32], [ValueType::I32]));
        let callee = module.push_func(ty);
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.values_mut().push_const(crate::value::ConstValue::I32(1));
        t.do_call(callee).unwrap();
        assert_eq!(t.values_mut().height(), 1);
    }
}
