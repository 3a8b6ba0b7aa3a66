//! Parametric (`drop`/`select`) and variable-access (`local.*`/`global.*`)
//! opcodes.

use crate::error::{TranslationError, TranslationErrorInner};
use crate::instr::Instruction;
use crate::module::{GlobalIdx, ModuleContext};
use crate::stack::ValueSource;
use crate::translator::FuncTranslator;
use crate::visit::VisitResult;

impl<'m> FuncTranslator<'m> {
    pub(crate) fn do_drop(&mut self) -> VisitResult {
        self.pop_any_value()?;
        Ok(())
    }

    pub(crate) fn do_select(&mut self) -> VisitResult {
        let condition = self.pop_value(crate::value::ValueType::I32)?;
        let (on_false, false_ty) = self.pop_any_value()?;
        let (on_true, true_ty) = self.pop_any_value()?;
        if !self.is_reachable() {
            self.push_result(true_ty);
            return Ok(());
        }
        if true_ty != false_ty {
            return Err(TranslationError::new(TranslationErrorInner::TypeMismatch));
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::Select { result, condition, on_true, on_false });
        self.push_result(true_ty);
        Ok(())
    }

    pub(crate) fn do_local_get(&mut self, local_idx: u32) -> VisitResult {
        let ty = self.local_type(local_idx)?;
        self.values_mut().push_local(ty, local_idx);
        Ok(())
    }

    pub(crate) fn do_local_set(&mut self, local_idx: u32) -> VisitResult {
        let ty = self.local_type(local_idx)?;
        let src = self.pop_value(ty)?;
        self.write_local(local_idx, src, false);
        Ok(())
    }

    pub(crate) fn do_local_tee(&mut self, local_idx: u32) -> VisitResult {
        let ty = self.local_type(local_idx)?;
        let src = self.pop_value(ty)?;
        self.write_local(local_idx, src, true);
        self.values_mut().push_local(ty, local_idx);
        Ok(())
    }

    pub(crate) fn do_global_get(&mut self, global_idx: GlobalIdx) -> VisitResult {
        let ty = self.module().global_type(global_idx)?;
        if !self.is_reachable() {
            self.push_result(ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::GlobalGet { result, global: global_idx });
        self.push_result(ty);
        Ok(())
    }

    pub(crate) fn do_global_set(&mut self, global_idx: GlobalIdx) -> VisitResult {
        let ty = self.module().global_type(global_idx)?;
        let value = self.pop_value(ty)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::GlobalSet { value, global: global_idx });
        }
        Ok(())
    }
}
