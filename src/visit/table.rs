//! Table opcodes (`table.*`) and the reference-type opcodes (`ref.*`).

use crate::instr::Instruction;
use crate::module::{ElementSegmentIdx, FuncIdx, ModuleContext, TableIdx};
use crate::translator::FuncTranslator;
use crate::value::ValueType;
use crate::visit::VisitResult;

fn index_type(ctx: &dyn ModuleContext, table: TableIdx) -> Result<ValueType, crate::error::TranslationError> {
    Ok(if ctx.is_table64(table)? { ValueType::I64 } else { ValueType::I32 })
}

impl<'m> FuncTranslator<'m> {
    pub(crate) fn do_table_get(&mut self, table: TableIdx) -> VisitResult {
        let index_ty = index_type(self.module(), table)?;
        let index = self.pop_value(index_ty)?;
        let elem_ty = self.module().table_element_type(table)?;
        if !self.is_reachable() {
            self.push_result(elem_ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::TableGet { result, table, index });
        self.push_result(elem_ty);
        Ok(())
    }

    pub(crate) fn do_table_set(&mut self, table: TableIdx) -> VisitResult {
        let elem_ty = self.module().table_element_type(table)?;
        let value = self.pop_value(elem_ty)?;
        let index_ty = index_type(self.module(), table)?;
        let index = self.pop_value(index_ty)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::TableSet { table, index, value });
        }
        Ok(())
    }

    pub(crate) fn do_table_size(&mut self, table: TableIdx) -> VisitResult {
        let ty = index_type(self.module(), table)?;
        if !self.is_reachable() {
            self.push_result(ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::TableSize { result, table });
        self.push_result(ty);
        Ok(())
    }

    pub(crate) fn do_table_grow(&mut self, table: TableIdx) -> VisitResult {
        let index_ty = index_type(self.module(), table)?;
        let delta = self.pop_value(index_ty)?;
        let elem_ty = self.module().table_element_type(table)?;
        let init = self.pop_value(elem_ty)?;
        if !self.is_reachable() {
            self.push_result(index_ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::TableGrow { result, table, delta, init });
        self.push_result(index_ty);
        Ok(())
    }

    pub(crate) fn do_table_init(&mut self, table: TableIdx, elem: ElementSegmentIdx) -> VisitResult {
        self.module().validate_element_segment(elem)?;
        let len = self.pop_value(ValueType::I32)?;
        let src = self.pop_value(ValueType::I32)?;
        let dst_ty = index_type(self.module(), table)?;
        let dst = self.pop_value(dst_ty)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::TableInit { table, elem, dst, src, len });
        }
        Ok(())
    }

    pub(crate) fn do_table_copy(&mut self, dst_table: TableIdx, src_table: TableIdx) -> VisitResult {
        let len_ty = index_type(self.module(), src_table)?;
        let len = self.pop_value(len_ty)?;
        let src_ty = index_type(self.module(), src_table)?;
        let src = self.pop_value(src_ty)?;
        let dst_ty = index_type(self.module(), dst_table)?;
        let dst = self.pop_value(dst_ty)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::TableCopy { dst_table, src_table, dst, src, len });
        }
        Ok(())
    }

    pub(crate) fn do_table_fill(&mut self, table: TableIdx) -> VisitResult {
        let index_ty = index_type(self.module(), table)?;
        let len = self.pop_value(index_ty)?;
        let elem_ty = self.module().table_element_type(table)?;
        let value = self.pop_value(elem_ty)?;
        let dst = self.pop_value(index_ty)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::TableFill { table, dst, value, len });
        }
        Ok(())
    }

    pub(crate) fn do_elem_drop(&mut self, elem: ElementSegmentIdx) -> VisitResult {
        self.module().validate_element_segment(elem)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::ElemDrop(elem));
        }
        Ok(())
    }

    pub(crate) fn do_ref_null(&mut self, ty: ValueType) -> VisitResult {
        if !self.is_reachable() {
            self.push_result(ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::RefNull { result, ty });
        self.push_result(ty);
        Ok(())
    }

    pub(crate) fn do_ref_is_null(&mut self) -> VisitResult {
        let (input, _ref_ty) = self.pop_any_value()?;
        if !self.is_reachable() {
            self.push_result(ValueType::I32);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::RefIsNull { result, input });
        self.push_result(ValueType::I32);
        Ok(())
    }

    pub(crate) fn do_ref_func(&mut self, func: FuncIdx) -> VisitResult {
        self.module().validate_func_index(func)?;
        if !self.is_reachable() {
            self.push_result(ValueType::FuncRef);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::RefFunc { result, func });
        self.push_result(ValueType::FuncRef);
        Ok(())
    }
}
