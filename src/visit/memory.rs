//! Linear-memory opcodes: `load`/`store` and the bulk-memory operators.

use crate::error::{TranslationError, TranslationErrorInner};
use crate::instr::{Instruction, LoadOp, StoreOp};
use crate::module::{DataSegmentIdx, MemoryIdx, ModuleContext};
use crate::translator::FuncTranslator;
use crate::value::ValueType;
use crate::visit::{MemArg, VisitResult};

/// The natural (maximum allowed) alignment of a load, in `log2` bytes.
fn load_natural_align_log2(op: LoadOp) -> u8 {
    use LoadOp::*;
    match op {
        I32Load8S | I32Load8U | I64Load8S | I64Load8U => 0,
        I32Load16S | I32Load16U | I64Load16S | I64Load16U => 1,
        I32Load | I64Load32S | I64Load32U | F32Load => 2,
        I64Load | F64Load => 3,
    }
}

fn store_natural_align_log2(op: StoreOp) -> u8 {
    use StoreOp::*;
    match op {
        I32Store8 | I64Store8 => 0,
        I32Store16 | I64Store16 => 1,
        I32Store | I64Store32 | F32Store => 2,
        I64Store | F64Store => 3,
    }
}

fn address_type(ctx: &dyn ModuleContext, memory: MemoryIdx) -> Result<ValueType, TranslationError> {
    Ok(if ctx.is_memory64(memory)? { ValueType::I64 } else { ValueType::I32 })
}

impl<'m> FuncTranslator<'m> {
    pub(crate) fn do_load(&mut self, op: LoadOp, memarg: MemArg) -> VisitResult {
        let max_log2 = load_natural_align_log2(op);
        if memarg.align_log2 > max_log2 {
            return Err(TranslationError::new(TranslationErrorInner::InvalidAlignment {
                align_log2: memarg.align_log2,
                max_log2,
            }));
        }
        let addr_ty = address_type(self.module(), memarg.memory)?;
        let pointer = self.pop_value(addr_ty)?;
        let result_ty = op.result_type();
        if !self.is_reachable() {
            self.push_result(result_ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        // The instruction stream's offset immediate is a plain `u32`; this
        // crate does not carry 64-bit offsets through to the emitted
        // instruction even for a memory64 access.
        self.encoder_mut().emit(Instruction::Load { op, result, pointer, offset: memarg.offset as u32 });
        self.push_result(result_ty);
        Ok(())
    }

    pub(crate) fn do_store(&mut self, op: StoreOp, memarg: MemArg) -> VisitResult {
        let max_log2 = store_natural_align_log2(op);
        if memarg.align_log2 > max_log2 {
            return Err(TranslationError::new(TranslationErrorInner::InvalidAlignment {
                align_log2: memarg.align_log2,
                max_log2,
            }));
        }
        let value = self.pop_value(op.value_type())?;
        let addr_ty = address_type(self.module(), memarg.memory)?;
        let pointer = self.pop_value(addr_ty)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::Store { op, pointer, value, offset: memarg.offset as u32 });
        }
        Ok(())
    }

    pub(crate) fn do_memory_size(&mut self, memory: MemoryIdx) -> VisitResult {
        let ty = address_type(self.module(), memory)?;
        if !self.is_reachable() {
            self.push_result(ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::MemorySize { result, memory });
        self.push_result(ty);
        Ok(())
    }

    pub(crate) fn do_memory_grow(&mut self, memory: MemoryIdx) -> VisitResult {
        let ty = address_type(self.module(), memory)?;
        let delta = self.pop_value(ty)?;
        if !self.is_reachable() {
            self.push_result(ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::MemoryGrow { result, delta, memory });
        self.push_result(ty);
        Ok(())
    }

    pub(crate) fn do_memory_init(&mut self, memory: MemoryIdx, data: DataSegmentIdx) -> VisitResult {
        self.module().validate_data_segment(data)?;
        let len = self.pop_value(ValueType::I32)?;
        let src = self.pop_value(ValueType::I32)?;
        let dst_ty = address_type(self.module(), memory)?;
        let dst = self.pop_value(dst_ty)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::MemoryInit { memory, data, dst, src, len });
        }
        Ok(())
    }

    pub(crate) fn do_memory_copy(&mut self, dst_mem: MemoryIdx, src_mem: MemoryIdx) -> VisitResult {
        let len = self.pop_value(ValueType::I32)?;
        let src_ty = address_type(self.module(), src_mem)?;
        let src = self.pop_value(src_ty)?;
        let dst_ty = address_type(self.module(), dst_mem)?;
        let dst = self.pop_value(dst_ty)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::MemoryCopy { dst_memory: dst_mem, src_memory: src_mem, dst, src, len });
        }
        Ok(())
    }

    pub(crate) fn do_memory_fill(&mut self, memory: MemoryIdx) -> VisitResult {
        let len = self.pop_value(ValueType::I32)?;
        let value = self.pop_value(ValueType::I32)?;
        let dst_ty = address_type(self.module(), memory)?;
        let dst = self.pop_value(dst_ty)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::MemoryFill { memory, dst, value, len });
        }
        Ok(())
    }

    pub(crate) fn do_data_drop(&mut self, data: DataSegmentIdx) -> VisitResult {
        self.module().validate_data_segment(data)?;
        if self.is_reachable() {
            self.encoder_mut().emit(Instruction::DataDrop(data));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{EngineConfig, FuncIdx, SimpleModule};
    use crate::value::{ConstValue, FuncType};

    fn translator(module: &SimpleModule, interner: &mut crate::module::DedupFuncTypeInterner) -> FuncTranslator<'_> {
        let func_type = FuncType::new([], []);
        FuncTranslator::new(module, interner, EngineConfig::default(), FuncIdx::from_u32(0), func_type, &[], 0).unwrap()
    }

    #[test]
    fn load_rejects_overaligned_access() {
        let mut module = SimpleModule::new();
        let memory = module.push_memory(false);
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.values_mut().push_const(ConstValue::I32(0));
        let memarg = MemArg { offset: 0, align_log2: 3, memory };
        assert!(t.do_load(LoadOp::I32Load8U, memarg).is_err());
    }

    #[test]
    fn load_pushes_result_type() {
        let mut module = SimpleModule::new();
        let memory = module.push_memory(false);
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.values_mut().push_const(ConstValue::I32(0));
        let memarg = MemArg { offset: 4, align_log2: 2, memory };
        t.do_load(LoadOp::I32Load, memarg).unwrap();
        assert_eq!(t.values_mut().peek(0).unwrap().value_type(), ValueType::I32);
    }

    #[test]
    fn memory64_address_operand_is_i64() {
        let mut module = SimpleModule::new();
        let memory = module.push_memory(true);
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.values_mut().push_const(ConstValue::I32(0));
        let memarg = MemArg { offset: 0, align_log2: 0, memory };
        assert!(t.do_load(LoadOp::I32Load8U, memarg).is_err());
    }
}
